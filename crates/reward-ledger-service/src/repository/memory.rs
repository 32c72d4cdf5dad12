//! 内存存储后端
//!
//! 使用 DashMap 实现全部仓储接口，适用于本地开发和测试环境，进程重启即丢失。
//! 去重语义与 PostgreSQL 后端一致：记录按 ID 插入即去重，入账按记录 ID 门闩。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use super::traits::{
    LivestreamRepositoryTrait, RewardLedgerRepositoryTrait, UserPointsRepositoryTrait,
    UserRepositoryTrait,
};
use crate::error::Result;
use crate::models::{
    AppendOutcome, ApplyOutcome, Livestream, PendingDispatch, PointsDelta, RewardRecord,
    UserPointsAggregate, UserProfile,
};

#[derive(Debug, Clone)]
struct StoredReward {
    record: RewardRecord,
    dispatched: bool,
    attempts: i32,
}

/// 内存存储
///
/// 克隆得到的实例共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    users: Arc<DashMap<String, UserProfile>>,
    referral_codes: Arc<DashMap<String, String>>,
    livestreams: Arc<DashMap<String, Livestream>>,
    registrants: Arc<DashMap<String, HashSet<String>>>,
    rewards: Arc<DashMap<String, StoredReward>>,
    applications: Arc<DashSet<String>>,
    points: Arc<DashMap<String, UserPointsAggregate>>,
}

impl InMemoryStore {
    /// 创建新的内存存储实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或更新用户
    pub fn insert_user(&self, user: UserProfile) {
        if let Some(previous) = self.users.get(&user.user_id) {
            self.referral_codes.remove(&previous.referral_code);
        }
        self.referral_codes
            .insert(user.referral_code.clone(), user.user_id.clone());
        self.users.insert(user.user_id.clone(), user);
    }

    /// 插入或更新直播
    pub fn insert_livestream(&self, livestream: Livestream) {
        self.livestreams.insert(livestream.id.clone(), livestream);
    }

    /// 登记报名
    pub fn register(&self, livestream_id: &str, user_id: &str) {
        self.registrants
            .entry(livestream_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// 账本记录总数
    pub fn reward_count(&self) -> usize {
        self.rewards.len()
    }

    /// 未派发的记录数
    pub fn undispatched_count(&self) -> usize {
        self.rewards.iter().filter(|e| !e.value().dispatched).count()
    }

    /// 某条记录累计的派发失败次数
    pub fn dispatch_attempts(&self, reward_id: &str) -> Option<i32> {
        self.rewards.get(reward_id).map(|e| e.attempts)
    }
}

#[async_trait]
impl RewardLedgerRepositoryTrait for InMemoryStore {
    async fn append(&self, record: &RewardRecord) -> Result<AppendOutcome> {
        match self.rewards.entry(record.id.clone()) {
            Entry::Occupied(_) => Ok(AppendOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(StoredReward {
                    record: record.clone(),
                    dispatched: false,
                    attempts: 0,
                });
                Ok(AppendOutcome::Created)
            }
        }
    }

    async fn get(&self, owner_user_id: &str, reward_id: &str) -> Result<Option<RewardRecord>> {
        Ok(self
            .rewards
            .get(reward_id)
            .filter(|e| e.record.owner_user_id == owner_user_id)
            .map(|e| e.record.clone()))
    }

    async fn list_by_owner(&self, owner_user_id: &str, limit: i64) -> Result<Vec<RewardRecord>> {
        let mut records: Vec<RewardRecord> = self
            .rewards
            .iter()
            .filter(|e| e.record.owner_user_id == owner_user_id)
            .map(|e| e.record.clone())
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        records.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(records)
    }

    async fn list_undispatched(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<PendingDispatch>> {
        let mut pending: Vec<PendingDispatch> = self
            .rewards
            .iter()
            .filter(|e| !e.dispatched && e.attempts < max_attempts)
            .map(|e| PendingDispatch {
                record: e.record.clone(),
                attempts: e.attempts,
            })
            .collect();

        pending.sort_by(|a, b| {
            a.attempts
                .cmp(&b.attempts)
                .then_with(|| a.record.created_at.cmp(&b.record.created_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn mark_dispatched(&self, reward_id: &str) -> Result<()> {
        if let Some(mut entry) = self.rewards.get_mut(reward_id) {
            entry.dispatched = true;
        }
        Ok(())
    }

    async fn record_dispatch_failure(&self, reward_id: &str) -> Result<i32> {
        Ok(self
            .rewards
            .get_mut(reward_id)
            .map(|mut entry| {
                entry.attempts += 1;
                entry.attempts
            })
            .unwrap_or(0))
    }
}

#[async_trait]
impl UserPointsRepositoryTrait for InMemoryStore {
    async fn apply_reward(
        &self,
        reward_id: &str,
        user_id: &str,
        delta: &PointsDelta,
    ) -> Result<ApplyOutcome> {
        if !self.applications.insert(reward_id.to_string()) {
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        self.points
            .entry(user_id.to_string())
            .or_insert_with(|| UserPointsAggregate::empty(user_id))
            .apply(delta);

        Ok(ApplyOutcome::Applied)
    }

    async fn get(&self, user_id: &str) -> Result<UserPointsAggregate> {
        Ok(self
            .points
            .get(user_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| UserPointsAggregate::empty(user_id)))
    }
}

#[async_trait]
impl UserRepositoryTrait for InMemoryStore {
    async fn get_by_referral_code(&self, referral_code: &str) -> Result<Option<UserProfile>> {
        let Some(user_id) = self.referral_codes.get(referral_code).map(|e| e.value().clone())
        else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl LivestreamRepositoryTrait for InMemoryStore {
    async fn get_livestream(&self, livestream_id: &str) -> Result<Option<Livestream>> {
        Ok(self.livestreams.get(livestream_id).map(|e| e.value().clone()))
    }

    async fn is_registered(&self, livestream_id: &str, user_id: &str) -> Result<bool> {
        Ok(self
            .registrants
            .get(livestream_id)
            .is_some_and(|set| set.contains(user_id)))
    }
}
