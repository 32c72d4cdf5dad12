//! HTTP 接口测试
//!
//! 通过 `oneshot` 直接驱动路由，覆盖请求封装、身份解析和错误映射。

mod common;

use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::*;
use reward_ledger::api::{self, AppState, JwtVerifier};
use reward_shared::config::AuthConfig;

struct TestApp {
    harness: Harness,
    router: Router,
    jwt: JwtVerifier,
}

impl TestApp {
    fn new() -> Self {
        let harness = Harness::new();
        let jwt = JwtVerifier::new(&AuthConfig::default());
        let state = AppState {
            gatekeeper: harness.gatekeeper.clone(),
            queries: harness.queries.clone(),
            jwt: std::sync::Arc::new(jwt.clone()),
        };
        let router = api::router(state, Duration::from_secs(5));
        Self {
            harness,
            router,
            jwt,
        }
    }

    fn token(&self, email: &str) -> String {
        self.jwt
            .issue("uid", Some(email), chrono::Duration::minutes(5))
            .unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        caller: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token(caller)),
            );
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn claim(&self, caller: Option<&str>, code: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/v1/rewards/claim-livestream-attendance",
            caller,
            Some(json!({ "data": { "livestreamId": LIVE, "referralCode": code } })),
        )
        .await
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_claim_success_returns_null_result() {
    let app = TestApp::new();

    let (status, body) = app.claim(Some(FOLLOWER), LEADER_CODE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "result": null }));
    assert_eq!(app.harness.store.reward_count(), 1);
}

#[tokio::test]
async fn test_duplicate_claim_is_tagged() {
    let app = TestApp::new();
    app.claim(Some(FOLLOWER), LEADER_CODE).await;

    let (status, body) = app.claim(Some(FOLLOWER), LEADER_CODE).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], "FAILED_PRECONDITION");
    assert_eq!(body["error"]["message"], "Duplicated");
}

#[tokio::test]
async fn test_policy_failures_share_one_response() {
    let app = TestApp::new();

    let unknown = app.claim(Some(FOLLOWER), "NOPE").await;
    let own = app.claim(Some(FOLLOWER), FOLLOWER_CODE).await;
    assert_eq!(unknown, own);
    assert_eq!(unknown.0, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.1["error"]["status"], "FAILED_PRECONDITION");
    assert_eq!(unknown.1["error"]["message"], "Something wrong happened");

    app.harness
        .store
        .insert_livestream(livestream(LIVE, false, false, false));
    let not_started = app.claim(Some(FOLLOWER), LEADER_CODE).await;
    assert_eq!(not_started, unknown);
    assert_eq!(app.harness.store.reward_count(), 0);
}

#[tokio::test]
async fn test_missing_identity_or_data_is_invalid_argument() {
    let app = TestApp::new();

    let (status, body) = app.claim(None, LEADER_CODE).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");

    let (status, body) = app
        .call(
            "POST",
            "/v1/rewards/claim-livestream-attendance",
            Some(FOLLOWER),
            Some(json!({ "data": { "livestreamId": LIVE } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
    assert_eq!(body["error"]["message"], "Required data not present");

    // 只含空白的推荐码
    let (status, body) = app.claim(Some(FOLLOWER), "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
    assert_eq!(body["error"]["message"], "Required data not present");

    // 非 JSON 请求体
    let request = Request::builder()
        .method("POST")
        .uri("/v1/rewards/claim-livestream-attendance")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(FOLLOWER)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_token_is_treated_as_anonymous() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("GET")
        .uri("/v1/users/me/points")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_points_and_rewards_after_relay() {
    let app = TestApp::new();
    app.claim(Some(FOLLOWER), LEADER_CODE).await;
    app.harness.relay.drain().await.unwrap();

    let (status, body) = app
        .call("GET", "/v1/users/me/points", Some(LEADER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["userId"], LEADER);
    assert_eq!(body["result"]["totalPoints"], 20);
    assert_eq!(body["result"]["totalLivestreamInvites"], 1);

    let (status, body) = app
        .call("GET", "/v1/users/me/rewards?limit=5", Some(LEADER), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["result"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "LIVESTREAM_INVITE_COMPLETE_LEADER");
    assert_eq!(entries[0]["relatedUserId"], FOLLOWER);
    assert_eq!(entries[0]["points"], 20);
}

#[tokio::test]
async fn test_list_reward_actions() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/v1/reward-actions", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let actions = body["result"].as_array().unwrap();
    assert_eq!(actions.len(), 9);
    let follower = actions
        .iter()
        .find(|a| a["id"] == "LIVESTREAM_INVITE_COMPLETE_FOLLOWER")
        .unwrap();
    assert_eq!(follower["points"], 20);
    assert_eq!(follower["cascadesTo"], "LIVESTREAM_INVITE_COMPLETE_LEADER");
}

#[tokio::test]
async fn test_user_action_endpoint() {
    let app = TestApp::new();
    let body = json!({
        "data": { "action": "LIVESTREAM_USER_HAND_RAISED", "livestreamId": LIVE }
    });

    let (status, _) = app
        .call("POST", "/v1/rewards/user-action", Some(FOLLOWER), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = app
        .call("POST", "/v1/rewards/user-action", Some(FOLLOWER), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["message"], "Duplicated");
}

#[tokio::test]
async fn test_registration_reward() {
    let app = TestApp::new();
    let register = |code: &str, invite: &str| {
        json!({
            "data": {
                "livestreamId": LIVE,
                "referral": { "referralCode": code, "inviteLivestream": invite }
            }
        })
    };

    // 邀请链接指向其他直播时静默跳过
    let (status, body) = app
        .call(
            "POST",
            "/v1/rewards/livestream-registration",
            Some(FOLLOWER),
            Some(register(LEADER_CODE, "other-live")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["rewarded"], false);

    // 自己的推荐码同样跳过
    let (_, body) = app
        .call(
            "POST",
            "/v1/rewards/livestream-registration",
            Some(FOLLOWER),
            Some(register(FOLLOWER_CODE, LIVE)),
        )
        .await;
    assert_eq!(body["result"]["rewarded"], false);

    let (status, body) = app
        .call(
            "POST",
            "/v1/rewards/livestream-registration",
            Some(FOLLOWER),
            Some(register(LEADER_CODE, LIVE)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["rewarded"], true);

    // 重复调用不报错
    let (status, body) = app
        .call(
            "POST",
            "/v1/rewards/livestream-registration",
            Some(FOLLOWER),
            Some(register(LEADER_CODE, LIVE)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["rewarded"], false);

    app.harness.relay.drain().await.unwrap();
    assert_eq!(app.harness.store.reward_count(), 1);
}
