//! 用户积分聚合
//!
//! 聚合值是账本的缓存视图，只通过原子增量修改，
//! 并且每条账本记录至多计入一次。

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::models::RewardRecord;
use crate::taxonomy::{AggregateEffect, UserStat};

/// 用户积分聚合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserPointsAggregate {
    pub user_id: String,
    pub total_points: i64,
    pub referrals_count: i64,
    pub total_livestream_invites: i64,
    pub total_livestream_attendances: i64,
    pub total_questions_asked: i64,
    pub total_hand_raises: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPointsAggregate {
    /// 尚无任何入账的用户
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_points: 0,
            referrals_count: 0,
            total_livestream_invites: 0,
            total_livestream_attendances: 0,
            total_questions_asked: 0,
            total_hand_raises: 0,
            updated_at: None,
        }
    }

    pub fn stat(&self, stat: UserStat) -> i64 {
        match stat {
            UserStat::TotalLivestreamInvites => self.total_livestream_invites,
            UserStat::TotalLivestreamAttendances => self.total_livestream_attendances,
            UserStat::TotalQuestionsAsked => self.total_questions_asked,
            UserStat::TotalHandRaises => self.total_hand_raises,
        }
    }

    /// 在内存中套用一次增量（内存后端使用）
    pub fn apply(&mut self, delta: &PointsDelta) {
        self.total_points += delta.points;
        self.referrals_count += delta.referrals;
        match delta.stat {
            Some(UserStat::TotalLivestreamInvites) => self.total_livestream_invites += 1,
            Some(UserStat::TotalLivestreamAttendances) => self.total_livestream_attendances += 1,
            Some(UserStat::TotalQuestionsAsked) => self.total_questions_asked += 1,
            Some(UserStat::TotalHandRaises) => self.total_hand_raises += 1,
            None => {}
        }
        self.updated_at = Some(Utc::now());
    }
}

/// 一条账本记录对聚合的增量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsDelta {
    pub points: i64,
    pub referrals: i64,
    pub stat: Option<UserStat>,
}

impl PointsDelta {
    /// 积分取记录上的值，附加影响取分类表
    pub fn for_record(record: &RewardRecord) -> Self {
        let (referrals, stat) = match record.action.kind().effect {
            AggregateEffect::None => (0, None),
            AggregateEffect::ReferralCount => (1, None),
            AggregateEffect::Stat(stat) => (0, Some(stat)),
        };
        Self {
            points: record.points,
            referrals,
            stat,
        }
    }
}

/// 入账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// 该记录之前已经入账
    AlreadyApplied,
}
