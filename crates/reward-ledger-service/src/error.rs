//! 奖励账本服务错误类型
//!
//! 业务校验失败统一收敛为少数几类，避免调用方通过错误细节
//! 枚举出推荐码或直播是否存在。具体原因只写入服务端日志。

use std::fmt;

use reward_shared::error::RewardError;
use thiserror::Error;

use crate::taxonomy::RewardAction;

/// 前置条件不满足的具体原因（仅用于日志和测试断言）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyReason {
    UnknownReferralCode,
    SelfReferral,
    LivestreamMissing,
    LivestreamNotFound,
    LivestreamNotLive,
    NotRegistered,
    ActionNotAllowed,
}

impl fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::UnknownReferralCode => "referral code does not resolve to a user",
            Self::SelfReferral => "referral code belongs to the caller",
            Self::LivestreamMissing => "livestream id not provided",
            Self::LivestreamNotFound => "livestream does not exist",
            Self::LivestreamNotLive => "livestream is not live",
            Self::NotRegistered => "caller is not registered for the livestream",
            Self::ActionNotAllowed => "action cannot be claimed by callers",
        };
        f.write_str(reason)
    }
}

/// 奖励账本服务错误类型
#[derive(Debug, Error)]
pub enum LedgerError {
    // === 调用方错误 ===
    #[error("缺少必要参数: {0}")]
    InvalidArgument(String),

    #[error("前置条件不满足: {reason}")]
    PolicyViolation { reason: PolicyReason },

    #[error("重复领取: user_id={user_id}, action={action}")]
    DuplicateClaim {
        user_id: String,
        action: RewardAction,
    },

    // === 账本数据错误 ===
    #[error("未知的奖励动作: {0}")]
    UnknownAction(String),

    #[error("账本记录不完整: {0}")]
    MalformedRecord(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Shared(#[from] RewardError),
}

/// 奖励账本服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn policy(reason: PolicyReason) -> Self {
        Self::PolicyViolation { reason }
    }

    /// 检查是否为可重试的错误
    ///
    /// 只有瞬时的存储故障值得重试；记录本身有问题时重试没有意义。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
            Self::Shared(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::PolicyViolation { .. } | Self::DuplicateClaim { .. }
        )
    }

    /// 获取错误码（用于日志和指标标签）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::PolicyViolation { .. } => "POLICY_VIOLATION",
            Self::DuplicateClaim { .. } => "DUPLICATE_CLAIM",
            Self::UnknownAction(_) => "UNKNOWN_ACTION",
            Self::MalformedRecord(_) => "MALFORMED_RECORD",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Shared(e) => e.code(),
        }
    }
}
