//! 接口层共享状态

use std::sync::Arc;

use crate::service::{RewardGatekeeper, RewardQueryService};

use super::auth::JwtVerifier;

#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Arc<RewardGatekeeper>,
    pub queries: Arc<RewardQueryService>,
    pub jwt: Arc<JwtVerifier>,
}
