//! HTTP 接口层
//!
//! 写接口以可调用函数的形式暴露，读接口为普通 GET。
//! 除 `/health` 外的路由都经过身份中间件。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use auth::{Caller, JwtVerifier};
pub use error::{CallableError, CallableStatus};
pub use state::AppState;

/// 构建路由
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route(
            "/v1/rewards/claim-livestream-attendance",
            post(handlers::claim_livestream_attendance),
        )
        .route("/v1/rewards/user-action", post(handlers::reward_user_action))
        .route(
            "/v1/rewards/livestream-registration",
            post(handlers::reward_livestream_registration),
        )
        .route("/v1/users/me/points", get(handlers::get_my_points))
        .route("/v1/users/me/rewards", get(handlers::list_my_rewards))
        .route("/v1/reward-actions", get(handlers::list_reward_actions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::caller_identity,
        ));

    Router::new()
        .merge(api)
        .route("/health", get(handlers::health_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
