//! 用户与直播的只读视图
//!
//! 这两类数据由平台其他服务维护，本服务只读取校验所需的字段。

use serde::Serialize;
use sqlx::FromRow;

/// 用户资料
///
/// `user_id` 即用户邮箱，与调用方令牌中的 `email` 声明一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub auth_id: Option<String>,
    pub referral_code: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// 直播
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Livestream {
    pub id: String,
    pub title: String,
    pub has_started: bool,
    pub has_ended: bool,
    /// 测试直播跳过开播和报名校验
    pub is_test: bool,
}

impl Livestream {
    /// 已开播且未结束
    pub fn is_live(&self) -> bool {
        self.has_started && !self.has_ended
    }
}
