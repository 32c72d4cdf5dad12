//! 集成测试公共夹具
//!
//! 基于内存存储装配完整的服务栈。

#![allow(dead_code)]

use std::sync::Arc;

use reward_ledger::models::{Livestream, UserProfile};
use reward_ledger::repository::InMemoryStore;
use reward_ledger::service::{
    CascadeDispatcher, DispatchRelay, RewardGatekeeper, RewardQueryService,
};
use reward_shared::config::RelayConfig;

pub const FOLLOWER: &str = "follower@example.com";
pub const LEADER: &str = "leader@example.com";
pub const LEADER_CODE: &str = "LEADER01";
pub const FOLLOWER_CODE: &str = "FOLLOW01";
pub const LIVE: &str = "live-1";

pub struct Harness {
    pub store: InMemoryStore,
    pub gatekeeper: Arc<RewardGatekeeper>,
    pub dispatcher: Arc<CascadeDispatcher>,
    pub relay: DispatchRelay,
    pub queries: Arc<RewardQueryService>,
}

impl Harness {
    /// 一场正在直播的直播，跟随者已报名，两名用户各有推荐码
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        store.insert_user(user(LEADER, LEADER_CODE));
        store.insert_user(user(FOLLOWER, FOLLOWER_CODE));
        store.insert_livestream(livestream(LIVE, true, false, false));
        store.register(LIVE, FOLLOWER);
        Self::with_store(store)
    }

    pub fn with_store(store: InMemoryStore) -> Self {
        let ledger = Arc::new(store.clone());
        let points = Arc::new(store.clone());

        let dispatcher = Arc::new(CascadeDispatcher::new(ledger.clone(), points.clone()));
        let gatekeeper = Arc::new(RewardGatekeeper::new(
            ledger.clone(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        ));
        let queries = Arc::new(RewardQueryService::new(ledger.clone(), points));
        let relay = DispatchRelay::new(ledger, dispatcher.clone(), fast_relay());

        Self {
            store,
            gatekeeper,
            dispatcher,
            relay,
            queries,
        }
    }

    pub async fn points_of(&self, user_id: &str) -> i64 {
        self.queries
            .get_points(Some(user_id))
            .await
            .unwrap()
            .total_points
    }
}

pub fn fast_relay() -> RelayConfig {
    RelayConfig {
        poll_interval_ms: 10,
        batch_size: 50,
        alert_after_attempts: 3,
        max_dispatch_attempts: 3,
        max_retries: 0,
        initial_retry_delay_ms: 1,
        max_retry_delay_ms: 1,
    }
}

pub fn user(user_id: &str, referral_code: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.to_string(),
        auth_id: None,
        referral_code: referral_code.to_string(),
        first_name: None,
        last_name: None,
    }
}

pub fn livestream(id: &str, has_started: bool, has_ended: bool, is_test: bool) -> Livestream {
    Livestream {
        id: id.to_string(),
        title: format!("Livestream {}", id),
        has_started,
        has_ended,
        is_test,
    }
}
