//! 用户目录与直播仓储（只读）

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::{LivestreamRepositoryTrait, UserRepositoryTrait};
use crate::error::Result;
use crate::models::{Livestream, UserProfile};

/// 用户目录仓储
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn get_by_referral_code(&self, referral_code: &str) -> Result<Option<UserProfile>> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, auth_id, referral_code, first_name, last_name
            FROM users
            WHERE referral_code = $1
            "#,
        )
        .bind(referral_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// 直播仓储
pub struct LivestreamRepository {
    pool: PgPool,
}

impl LivestreamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LivestreamRepositoryTrait for LivestreamRepository {
    async fn get_livestream(&self, livestream_id: &str) -> Result<Option<Livestream>> {
        let livestream = sqlx::query_as::<_, Livestream>(
            r#"
            SELECT id, title, has_started, has_ended, is_test
            FROM livestreams
            WHERE id = $1
            "#,
        )
        .bind(livestream_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(livestream)
    }

    async fn is_registered(&self, livestream_id: &str, user_id: &str) -> Result<bool> {
        let registered: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM livestream_registrants
                WHERE livestream_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(livestream_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(registered)
    }
}
