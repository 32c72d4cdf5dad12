//! HTTP 处理器
//!
//! 写接口沿用可调用函数的约定：请求体为 `{"data": ...}`，
//! 成功响应为 `{"result": ...}`，失败响应见 [`CallableError`]。

use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::UserPointsAggregate;
use crate::service::dto::{
    ActionKindDto, ClaimAttendanceRequest, RegistrationRequest, RegistrationResponse,
    RewardEntryDto, UserActionRequest,
};
use crate::service::gatekeeper::REQUIRED_DATA_MISSING;

use super::auth::Caller;
use super::error::CallableError;
use super::state::AppState;

/// 可调用函数请求体
#[derive(Debug, Default, Deserialize)]
pub struct CallableRequest<T> {
    #[serde(default)]
    pub data: T,
}

/// 可调用函数响应体
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

type CallableResult<T> = Result<Json<CallableResponse<T>>, CallableError>;

fn ok<T>(result: T) -> CallableResult<T> {
    Ok(Json(CallableResponse { result }))
}

/// 请求体无法解析时按缺参处理
fn payload<T>(
    payload: Result<Json<CallableRequest<T>>, JsonRejection>,
) -> Result<T, CallableError> {
    payload.map(|Json(body)| body.data).map_err(|rejection| {
        debug!(error = %rejection, "请求体解析失败");
        CallableError::invalid_argument(REQUIRED_DATA_MISSING)
    })
}

/// 领取直播邀请奖励
pub async fn claim_livestream_attendance(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CallableRequest<ClaimAttendanceRequest>>, JsonRejection>,
) -> CallableResult<()> {
    let request = payload(body)?;
    state
        .gatekeeper
        .claim_livestream_attendance(caller.as_deref(), &request)
        .await?;
    ok(())
}

/// 上报直播内活跃行为
pub async fn reward_user_action(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CallableRequest<UserActionRequest>>, JsonRejection>,
) -> CallableResult<()> {
    let request = payload(body)?;
    state
        .gatekeeper
        .reward_user_action(caller.as_deref(), &request)
        .await?;
    ok(())
}

/// 直播报名奖励
pub async fn reward_livestream_registration(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<CallableRequest<RegistrationRequest>>, JsonRejection>,
) -> CallableResult<RegistrationResponse> {
    let request = payload(body)?;
    let response = state
        .gatekeeper
        .reward_livestream_registration(caller.as_deref(), &request)
        .await?;
    ok(response)
}

/// 调用方积分聚合
pub async fn get_my_points(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> CallableResult<UserPointsAggregate> {
    ok(state.queries.get_points(caller.as_deref()).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRewardsQuery {
    pub limit: Option<i64>,
}

/// 调用方最近的账本记录
pub async fn list_my_rewards(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ListRewardsQuery>, QueryRejection>,
) -> CallableResult<Vec<RewardEntryDto>> {
    let Query(query) =
        query.map_err(|_| CallableError::invalid_argument("Invalid query parameters"))?;
    ok(state
        .queries
        .list_rewards(caller.as_deref(), query.limit)
        .await?)
}

/// 全部奖励动作
pub async fn list_reward_actions(
    State(state): State<AppState>,
) -> CallableResult<Vec<ActionKindDto>> {
    ok(state.queries.list_action_kinds())
}

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "reward-ledger-service"
    }))
}
