//! 服务层数据传输对象
//!
//! 定义服务层与外部交互使用的 DTO，与内部领域模型解耦

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::RewardRecord;
use crate::taxonomy::{ActionKind, RewardAction};

/// 空串和只含空白的字段都视为缺失
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// 领取直播邀请奖励请求
///
/// 字段缺省时反序列化为空串，由校验统一报告缺参。
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClaimAttendanceRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub livestream_id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub referral_code: String,
}

/// 上报直播内活跃行为请求
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserActionRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub action: String,
    #[serde(default)]
    pub livestream_id: Option<String>,
}

/// 报名时携带的邀请信息
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReferral {
    #[serde(default)]
    pub referral_code: String,
    /// 邀请链接指向的直播
    #[serde(default)]
    pub invite_livestream: Option<String>,
}

/// 直播报名奖励请求
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub livestream_id: String,
    #[serde(default)]
    pub referral: Option<RegistrationReferral>,
}

/// 直播报名奖励结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub rewarded: bool,
}

/// 奖励动作说明 DTO
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionKindDto {
    pub id: RewardAction,
    pub points: i64,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascades_to: Option<RewardAction>,
}

impl From<&ActionKind> for ActionKindDto {
    fn from(kind: &ActionKind) -> Self {
        Self {
            id: kind.action,
            points: kind.points,
            description: kind.description,
            cascades_to: kind.cascade,
        }
    }
}

/// 账本记录 DTO
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEntryDto {
    pub id: String,
    pub path: String,
    pub action: RewardAction,
    pub description: &'static str,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub livestream_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RewardRecord> for RewardEntryDto {
    fn from(record: RewardRecord) -> Self {
        Self {
            path: record.path(),
            description: record.action.kind().description,
            id: record.id,
            action: record.action,
            points: record.points,
            related_user_id: record.related_user_id,
            livestream_id: record.livestream_id,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_request_missing_fields_fail_validation() {
        let request: ClaimAttendanceRequest =
            serde_json::from_str(r#"{"livestreamId":"live-1"}"#).unwrap();
        assert!(request.validate().is_err());

        let request: ClaimAttendanceRequest =
            serde_json::from_str(r#"{"livestreamId":"live-1","referralCode":"CODE"}"#).unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_whitespace_only_fields_fail_validation() {
        let request: ClaimAttendanceRequest =
            serde_json::from_str(r#"{"livestreamId":"live-1","referralCode":"   "}"#).unwrap();
        assert!(request.validate().is_err());

        let request: ClaimAttendanceRequest =
            serde_json::from_str(r#"{"livestreamId":"\t ","referralCode":"CODE"}"#).unwrap();
        assert!(request.validate().is_err());

        let request: RegistrationRequest =
            serde_json::from_str(r#"{"livestreamId":"  "}"#).unwrap();
        assert!(request.validate().is_err());

        let request: UserActionRequest = serde_json::from_str(r#"{"action":" "}"#).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_action_kind_dto_serialization() {
        let dto = ActionKindDto::from(RewardAction::ReferralSignupFollower.kind());
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["id"], "REFERRAL_SIGNUP_FOLLOWER");
        assert_eq!(json["points"], 20);
        assert_eq!(json["cascadesTo"], "REFERRAL_SIGNUP_LEADER");

        let dto = ActionKindDto::from(RewardAction::ReferralSignupLeader.kind());
        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("cascadesTo").is_none());
    }

    #[test]
    fn test_reward_entry_dto_carries_path() {
        let record = RewardRecord::issue(
            "a@example.com",
            RewardAction::LivestreamUserAttended,
            None,
            Some("live-1".to_string()),
        )
        .unwrap();
        let id = record.id.clone();
        let dto = RewardEntryDto::from(record);
        assert_eq!(dto.path, format!("users/a@example.com/rewards/{}", id));
        assert_eq!(dto.description, "Attended a livestream");
    }
}
