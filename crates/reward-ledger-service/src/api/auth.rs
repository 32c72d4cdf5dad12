//! 调用方身份
//!
//! 令牌由平台认证系统签发（HS256），本服务只校验签名、签发者和有效期，
//! 并以 `email` 声明作为调用方 ID。令牌缺失或无效时请求照常进入处理器，
//! 由服务层按缺参处理。

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use reward_shared::config::AuthConfig;

use super::state::AppState;

/// JWT Claims（Token 载荷）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerClaims {
    /// 认证系统中的用户 ID
    pub sub: String,
    /// 邮箱，即本服务的用户 ID
    #[serde(default)]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// 请求扩展中的调用方身份
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<String>);

impl Caller {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// JWT 校验器
#[derive(Clone)]
pub struct JwtVerifier {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            issuer: config.jwt_issuer.clone(),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// 验证并解析 JWT Token
    pub fn verify(&self, token: &str) -> Result<CallerClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<CallerClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }

    /// 签发令牌（本地联调和测试使用，生产令牌由认证系统签发）
    pub fn issue(
        &self,
        sub: &str,
        email: Option<&str>,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = CallerClaims {
            sub: sub.to_string(),
            email: email.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// 从请求头解析调用方邮箱
    pub fn caller_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))?;

        match self.verify(token) {
            Ok(claims) => claims.email.filter(|e| !e.is_empty()),
            Err(e) => {
                debug!(error = %e, "调用方令牌无效");
                None
            }
        }
    }
}

/// 身份中间件：把解析出的调用方写入请求扩展
pub async fn caller_identity(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let caller = state.jwt.caller_from_headers(request.headers());
    request.extensions_mut().insert(Caller(caller));
    next.run(request).await
}
