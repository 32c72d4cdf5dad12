//! 用户积分聚合仓储
//!
//! 入账在一个事务内完成两件事：写入 `reward_applications` 门闩行，
//! 以及对 `user_points` 做原子增量。门闩行已存在说明这条记录入过账，
//! 事务直接放弃，聚合保持不变。

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use super::traits::UserPointsRepositoryTrait;
use crate::error::Result;
use crate::models::{ApplyOutcome, PointsDelta, UserPointsAggregate};
use crate::taxonomy::UserStat;

/// 用户积分聚合仓储
pub struct UserPointsRepository {
    pool: PgPool,
}

impl UserPointsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 以记录 ID 为门闩入账
    pub async fn apply_reward(
        &self,
        reward_id: &str,
        user_id: &str,
        delta: &PointsDelta,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO reward_applications (reward_id, user_id, applied_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (reward_id) DO NOTHING
            "#,
        )
        .bind(reward_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            debug!(reward_id, user_id, "记录已入账，跳过");
            tx.rollback().await?;
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        Self::increment_in_tx(&mut tx, user_id, delta.points).await?;
        if delta.referrals != 0 {
            Self::increment_referral_count_in_tx(&mut tx, user_id, delta.referrals).await?;
        }
        if let Some(stat) = delta.stat {
            Self::increment_stat_in_tx(&mut tx, user_id, stat).await?;
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    /// 在事务中累加积分（行不存在时创建）
    pub async fn increment_in_tx(tx: &mut PgConnection, user_id: &str, points: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_points (user_id, total_points, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET total_points = user_points.total_points + EXCLUDED.total_points,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(points)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 在事务中累加推荐人数
    pub async fn increment_referral_count_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        delta: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_points (user_id, referrals_count, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET referrals_count = user_points.referrals_count + EXCLUDED.referrals_count,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 在事务中对某项活跃度统计加一
    ///
    /// 列名来自 [`UserStat::column`] 的固定取值，不接受外部输入。
    pub async fn increment_stat_in_tx(
        tx: &mut PgConnection,
        user_id: &str,
        stat: UserStat,
    ) -> Result<()> {
        let column = stat.column();
        let sql = format!(
            r#"
            INSERT INTO user_points (user_id, {column}, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET {column} = user_points.{column} + 1,
                updated_at = NOW()
            "#
        );

        sqlx::query(&sql).bind(user_id).execute(tx).await?;

        Ok(())
    }

    /// 查询用户聚合，尚无入账时返回全零
    pub async fn get(&self, user_id: &str) -> Result<UserPointsAggregate> {
        let aggregate = sqlx::query_as::<_, UserPointsAggregate>(
            r#"
            SELECT user_id, total_points, referrals_count, total_livestream_invites,
                   total_livestream_attendances, total_questions_asked, total_hand_raises,
                   updated_at
            FROM user_points
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(aggregate.unwrap_or_else(|| UserPointsAggregate::empty(user_id)))
    }
}

#[async_trait]
impl UserPointsRepositoryTrait for UserPointsRepository {
    async fn apply_reward(
        &self,
        reward_id: &str,
        user_id: &str,
        delta: &PointsDelta,
    ) -> Result<ApplyOutcome> {
        self.apply_reward(reward_id, user_id, delta).await
    }

    async fn get(&self, user_id: &str) -> Result<UserPointsAggregate> {
        self.get(user_id).await
    }
}
