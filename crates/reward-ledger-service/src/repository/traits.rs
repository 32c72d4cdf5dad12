//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AppendOutcome, ApplyOutcome, Livestream, PendingDispatch, PointsDelta, RewardRecord,
    UserPointsAggregate, UserProfile,
};

/// 奖励账本仓储接口
///
/// 记录只允许追加，`append` 对相同 ID 的第二次写入不报错也不覆盖。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardLedgerRepositoryTrait: Send + Sync {
    async fn append(&self, record: &RewardRecord) -> Result<AppendOutcome>;
    async fn get(&self, owner_user_id: &str, reward_id: &str) -> Result<Option<RewardRecord>>;
    async fn list_by_owner(&self, owner_user_id: &str, limit: i64) -> Result<Vec<RewardRecord>>;

    // 派发状态
    /// 失败次数少的优先，失败次数达到 `max_attempts` 的记录不再返回
    async fn list_undispatched(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<PendingDispatch>>;
    async fn mark_dispatched(&self, reward_id: &str) -> Result<()>;
    /// 返回累计失败次数
    async fn record_dispatch_failure(&self, reward_id: &str) -> Result<i32>;
}

/// 用户积分聚合仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserPointsRepositoryTrait: Send + Sync {
    /// 以记录 ID 为门闩入账，同一条记录只会生效一次
    async fn apply_reward(
        &self,
        reward_id: &str,
        user_id: &str,
        delta: &PointsDelta,
    ) -> Result<ApplyOutcome>;
    async fn get(&self, user_id: &str) -> Result<UserPointsAggregate>;
}

/// 用户目录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn get_by_referral_code(&self, referral_code: &str) -> Result<Option<UserProfile>>;
}

/// 直播仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LivestreamRepositoryTrait: Send + Sync {
    async fn get_livestream(&self, livestream_id: &str) -> Result<Option<Livestream>>;
    async fn is_registered(&self, livestream_id: &str, user_id: &str) -> Result<bool>;
}
