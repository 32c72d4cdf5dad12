//! 可调用接口的错误响应
//!
//! 对外只暴露三种状态：参数错误、前置条件失败、内部错误。
//! 前置条件失败只区分"重复领取"和其他情况，其余细节只写服务端日志。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::LedgerError;

/// 前置条件失败的统一提示
pub const POLICY_VIOLATION_MESSAGE: &str = "Something wrong happened";
/// 重复领取提示
pub const DUPLICATED_MESSAGE: &str = "Duplicated";
/// 内部错误提示
pub const INTERNAL_MESSAGE: &str = "Internal error";

/// 错误状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallableStatus {
    InvalidArgument,
    FailedPrecondition,
    Internal,
}

impl CallableStatus {
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidArgument | Self::FailedPrecondition => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 可调用接口错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableError {
    pub status: CallableStatus,
    pub message: String,
}

impl CallableError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            status: CallableStatus::InvalidArgument,
            message: message.into(),
        }
    }
}

impl From<LedgerError> for CallableError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidArgument(message) => Self::invalid_argument(message),
            LedgerError::PolicyViolation { .. } => Self {
                status: CallableStatus::FailedPrecondition,
                message: POLICY_VIOLATION_MESSAGE.to_string(),
            },
            LedgerError::DuplicateClaim { .. } => Self {
                status: CallableStatus::FailedPrecondition,
                message: DUPLICATED_MESSAGE.to_string(),
            },
            // 系统级错误只返回通用提示，详细信息仅记录日志
            other => {
                tracing::error!(code = other.error_code(), error = %other, "请求处理失败");
                Self {
                    status: CallableStatus::Internal,
                    message: INTERNAL_MESSAGE.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for CallableError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "status": self.status,
                "message": self.message,
            }
        });

        (self.status.http_status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyReason;
    use crate::taxonomy::RewardAction;

    #[test]
    fn test_policy_reasons_are_indistinguishable() {
        let unknown: CallableError = LedgerError::policy(PolicyReason::UnknownReferralCode).into();
        let own: CallableError = LedgerError::policy(PolicyReason::SelfReferral).into();
        let not_live: CallableError = LedgerError::policy(PolicyReason::LivestreamNotLive).into();

        assert_eq!(unknown, own);
        assert_eq!(unknown, not_live);
        assert_eq!(unknown.status, CallableStatus::FailedPrecondition);
        assert_eq!(unknown.message, POLICY_VIOLATION_MESSAGE);
    }

    #[test]
    fn test_duplicate_maps_to_duplicated() {
        let err: CallableError = LedgerError::DuplicateClaim {
            user_id: "a@example.com".to_string(),
            action: RewardAction::LivestreamInviteCompleteFollower,
        }
        .into();
        assert_eq!(err.status, CallableStatus::FailedPrecondition);
        assert_eq!(err.message, DUPLICATED_MESSAGE);
    }

    #[test]
    fn test_storage_error_hides_details() {
        let err: CallableError = LedgerError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.status, CallableStatus::Internal);
        assert_eq!(err.message, INTERNAL_MESSAGE);
        assert_eq!(err.status.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&CallableStatus::FailedPrecondition).unwrap();
        assert_eq!(json, "\"FAILED_PRECONDITION\"");
    }
}
