//! 奖励账本仓储
//!
//! 记录以确定性 ID 为主键，`append` 依靠 `ON CONFLICT DO NOTHING` 实现
//! 插入即去重；派发状态（`dispatched_at`、`dispatch_attempts`）与记录同表存放，
//! 中继据此轮询未派发的记录。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::error;

use super::traits::RewardLedgerRepositoryTrait;
use crate::error::{LedgerError, Result};
use crate::models::{AppendOutcome, PendingDispatch, RewardRecord};
use crate::taxonomy::RewardAction;

/// 数据库行
///
/// `action` 以字符串读出，分类表中不存在的动作在转换时报错。
#[derive(Debug, FromRow)]
struct RewardRow {
    id: String,
    owner_user_id: String,
    action: String,
    points: i64,
    related_user_id: Option<String>,
    livestream_id: Option<String>,
    created_at: DateTime<Utc>,
    dispatch_attempts: i32,
}

impl TryFrom<RewardRow> for PendingDispatch {
    type Error = LedgerError;

    fn try_from(row: RewardRow) -> Result<Self> {
        let action: RewardAction = row
            .action
            .parse()
            .map_err(|_| LedgerError::UnknownAction(row.action.clone()))?;

        Ok(Self {
            record: RewardRecord {
                id: row.id,
                owner_user_id: row.owner_user_id,
                action,
                points: row.points,
                related_user_id: row.related_user_id,
                livestream_id: row.livestream_id,
                created_at: row.created_at,
            },
            attempts: row.dispatch_attempts,
        })
    }
}

/// 批量读取时跳过无法解析的行
///
/// 这类行保持未派发状态，由日志告警人工处理，不阻塞同批的其他记录。
fn decode_rows(rows: Vec<RewardRow>) -> Vec<PendingDispatch> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match PendingDispatch::try_from(row) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    error!(reward_id = %id, error = %e, "账本记录无法解析，已跳过");
                    None
                }
            }
        })
        .collect()
}

/// 奖励账本仓储
pub struct RewardLedgerRepository {
    pool: PgPool,
}

impl RewardLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 追加记录，ID 冲突时不写入
    pub async fn append(&self, record: &RewardRecord) -> Result<AppendOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO rewards (id, owner_user_id, action, points, related_user_id, livestream_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_user_id)
        .bind(record.action.as_str())
        .bind(record.points)
        .bind(&record.related_user_id)
        .bind(&record.livestream_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(AppendOutcome::Created)
        } else {
            Ok(AppendOutcome::AlreadyExists)
        }
    }

    pub async fn get(&self, owner_user_id: &str, reward_id: &str) -> Result<Option<RewardRecord>> {
        let row = sqlx::query_as::<_, RewardRow>(
            r#"
            SELECT id, owner_user_id, action, points, related_user_id, livestream_id,
                   created_at, dispatch_attempts
            FROM rewards
            WHERE owner_user_id = $1 AND id = $2
            "#,
        )
        .bind(owner_user_id)
        .bind(reward_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| PendingDispatch::try_from(r).map(|p| p.record))
            .transpose()
    }

    /// 列出用户的账本记录
    ///
    /// 按时间倒序排列，返回最近的 limit 条记录
    pub async fn list_by_owner(&self, owner_user_id: &str, limit: i64) -> Result<Vec<RewardRecord>> {
        let rows = sqlx::query_as::<_, RewardRow>(
            r#"
            SELECT id, owner_user_id, action, points, related_user_id, livestream_id,
                   created_at, dispatch_attempts
            FROM rewards
            WHERE owner_user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(owner_user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows).into_iter().map(|p| p.record).collect())
    }

    /// 待派发记录，失败次数少的优先，同次数内按写入顺序
    ///
    /// 失败次数达到上限的记录不再取出，避免持续失败的记录占满批次。
    pub async fn list_undispatched(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<PendingDispatch>> {
        let rows = sqlx::query_as::<_, RewardRow>(
            r#"
            SELECT id, owner_user_id, action, points, related_user_id, livestream_id,
                   created_at, dispatch_attempts
            FROM rewards
            WHERE dispatched_at IS NULL AND dispatch_attempts < $2
            ORDER BY dispatch_attempts, created_at, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    pub async fn mark_dispatched(&self, reward_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE rewards
            SET dispatched_at = NOW()
            WHERE id = $1 AND dispatched_at IS NULL
            "#,
        )
        .bind(reward_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_dispatch_failure(&self, reward_id: &str) -> Result<i32> {
        let attempts: i32 = sqlx::query_scalar(
            r#"
            UPDATE rewards
            SET dispatch_attempts = dispatch_attempts + 1
            WHERE id = $1
            RETURNING dispatch_attempts
            "#,
        )
        .bind(reward_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(attempts)
    }
}

#[async_trait]
impl RewardLedgerRepositoryTrait for RewardLedgerRepository {
    async fn append(&self, record: &RewardRecord) -> Result<AppendOutcome> {
        self.append(record).await
    }

    async fn get(&self, owner_user_id: &str, reward_id: &str) -> Result<Option<RewardRecord>> {
        self.get(owner_user_id, reward_id).await
    }

    async fn list_by_owner(&self, owner_user_id: &str, limit: i64) -> Result<Vec<RewardRecord>> {
        self.list_by_owner(owner_user_id, limit).await
    }

    async fn list_undispatched(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<PendingDispatch>> {
        self.list_undispatched(limit, max_attempts).await
    }

    async fn mark_dispatched(&self, reward_id: &str) -> Result<()> {
        self.mark_dispatched(reward_id).await
    }

    async fn record_dispatch_failure(&self, reward_id: &str) -> Result<i32> {
        self.record_dispatch_failure(reward_id).await
    }
}
