//! 奖励账本记录
//!
//! 记录一经写入不可修改。记录 ID 由动作的自然元组经 SHA-256 派生，
//! 相同的业务事实无论重试多少次都落到同一个 ID 上。

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};
use crate::taxonomy::RewardAction;

/// 元组分量之间的分隔符（ASCII Unit Separator），避免 "ab"+"c" 与 "a"+"bc" 撞键
const KEY_SEPARATOR: &[u8] = &[0x1f];

/// 奖励账本记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRecord {
    pub id: String,
    pub owner_user_id: String,
    pub action: RewardAction,
    /// 创建时从分类表复制，之后不随分类表变化
    pub points: i64,
    pub related_user_id: Option<String>,
    pub livestream_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RewardRecord {
    /// 按分类表生成一条新记录
    ///
    /// 动作的幂等键需要的分量缺失时返回 `MalformedRecord`。
    pub fn issue(
        owner_user_id: impl Into<String>,
        action: RewardAction,
        related_user_id: Option<String>,
        livestream_id: Option<String>,
    ) -> Result<Self> {
        let owner_user_id = owner_user_id.into();
        let id = Self::reward_id(
            &owner_user_id,
            action,
            related_user_id.as_deref(),
            livestream_id.as_deref(),
        )?;

        Ok(Self {
            id,
            owner_user_id,
            action,
            points: action.kind().points,
            related_user_id,
            livestream_id,
            created_at: Utc::now(),
        })
    }

    /// 计算确定性记录 ID（小写十六进制 SHA-256）
    pub fn reward_id(
        owner_user_id: &str,
        action: RewardAction,
        related_user_id: Option<&str>,
        livestream_id: Option<&str>,
    ) -> Result<String> {
        if owner_user_id.is_empty() {
            return Err(LedgerError::MalformedRecord(format!(
                "{} 缺少记录归属用户",
                action
            )));
        }

        let scope = action.kind().key_scope;
        let mut hasher = Sha256::new();
        hasher.update(owner_user_id.as_bytes());
        hasher.update(KEY_SEPARATOR);
        hasher.update(action.as_str().as_bytes());

        if scope.needs_livestream() {
            let livestream_id = non_empty(livestream_id).ok_or_else(|| {
                LedgerError::MalformedRecord(format!("{} 缺少 livestream_id", action))
            })?;
            hasher.update(KEY_SEPARATOR);
            hasher.update(livestream_id.as_bytes());
        }

        if scope.needs_related_user() {
            let related_user_id = non_empty(related_user_id).ok_or_else(|| {
                LedgerError::MalformedRecord(format!("{} 缺少 related_user_id", action))
            })?;
            hasher.update(KEY_SEPARATOR);
            hasher.update(related_user_id.as_bytes());
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// 文档路径形式 `users/{userId}/rewards/{id}`
    pub fn path(&self) -> String {
        format!("users/{}/rewards/{}", self.owner_user_id, self.id)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// 追加写入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Created,
    /// 相同 ID 的记录已存在，本次未写入
    AlreadyExists,
}

/// 待派发的账本记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDispatch {
    pub record: RewardRecord,
    /// 之前派发失败的次数
    pub attempts: i32,
}
