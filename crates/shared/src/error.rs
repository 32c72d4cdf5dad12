//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。
//! 领域错误由各服务自行定义，并通过 `#[from]` 透传本类型。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum RewardError {
    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 验证错误 ====================
    #[error("参数验证失败: {0}")]
    Validation(String),

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, RewardError>;

impl RewardError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 连接池超时、连接中断等瞬时故障可以重试；约束冲突等数据错误不可重试。
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = RewardError::Internal("boom".to_string());
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let err = RewardError::Validation("batch_size 必须大于 0".to_string());
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = RewardError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let row_err = RewardError::Database(sqlx::Error::RowNotFound);
        assert!(!row_err.is_retryable());

        assert!(!RewardError::Internal("x".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = RewardError::Validation("poll_interval_ms 必须大于 0".to_string());
        assert_eq!(err.to_string(), "参数验证失败: poll_interval_ms 必须大于 0");
    }
}
