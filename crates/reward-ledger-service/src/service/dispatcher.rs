//! 级联派发器
//!
//! 对每条新写入的账本记录执行后续动作，投递语义为至少一次：
//!
//! 1. 以记录 ID 为门闩把积分和附加统计计入归属用户
//! 2. 动作有级联目标时，为关联用户追加一条对应的 `_LEADER` 记录
//!
//! 两步都是幂等的，同一条记录被重复投递不会重复入账，也不会重复生成邀请人记录。
//! 级联目标在分类表中都是终止动作，派生的记录不会再派生。

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument};

use reward_shared::observability::metrics;

use crate::error::{LedgerError, Result};
use crate::models::{AppendOutcome, ApplyOutcome, PointsDelta, RewardRecord};
use crate::repository::{RewardLedgerRepositoryTrait, UserPointsRepositoryTrait};

/// 单条记录的派发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub applied: ApplyOutcome,
    /// 派生的对应记录及其写入结果
    pub counterpart: Option<(RewardRecord, AppendOutcome)>,
}

/// 级联派发器
pub struct CascadeDispatcher {
    ledger: Arc<dyn RewardLedgerRepositoryTrait>,
    points: Arc<dyn UserPointsRepositoryTrait>,
}

impl CascadeDispatcher {
    pub fn new(
        ledger: Arc<dyn RewardLedgerRepositoryTrait>,
        points: Arc<dyn UserPointsRepositoryTrait>,
    ) -> Self {
        Self { ledger, points }
    }

    /// 派发一条账本记录
    #[instrument(skip(self, record), fields(reward_id = %record.id, action = %record.action))]
    pub async fn dispatch(&self, record: &RewardRecord) -> Result<DispatchOutcome> {
        let started = Instant::now();
        let result = self.dispatch_inner(record).await;

        let outcome = match &result {
            Ok(o) if o.applied == ApplyOutcome::AlreadyApplied => "replayed",
            Ok(_) => "applied",
            Err(e) => e.error_code(),
        };
        metrics::record_dispatch(
            record.action.as_str(),
            outcome,
            started.elapsed().as_secs_f64(),
        );

        if let Err(e) = &result
            && !e.is_retryable()
        {
            error!(owner = %record.owner_user_id, error = %e, "账本记录派发失败且不可重试");
        }
        result
    }

    async fn dispatch_inner(&self, record: &RewardRecord) -> Result<DispatchOutcome> {
        let kind = record.action.kind();

        // 级联所需的关联用户先校验，避免入账后才发现记录不完整
        let leader = match kind.cascade {
            Some(_) => Some(
                record
                    .related_user_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        LedgerError::MalformedRecord(format!(
                            "{} 记录缺少 related_user_id: {}",
                            record.action, record.id
                        ))
                    })?,
            ),
            None => None,
        };

        let delta = PointsDelta::for_record(record);
        let applied = self
            .points
            .apply_reward(&record.id, &record.owner_user_id, &delta)
            .await?;

        if applied == ApplyOutcome::Applied {
            metrics::record_points_applied(record.action.as_str(), delta.points);
            info!(
                user_id = %record.owner_user_id,
                points = delta.points,
                "积分已入账"
            );
        }

        let counterpart = match (kind.cascade, leader) {
            (Some(target), Some(leader)) => {
                let counterpart = RewardRecord::issue(
                    leader,
                    target,
                    Some(record.owner_user_id.clone()),
                    record.livestream_id.clone(),
                )?;
                let appended = self.ledger.append(&counterpart).await?;
                if appended == AppendOutcome::Created {
                    info!(
                        leader,
                        counterpart_id = %counterpart.id,
                        counterpart_action = %target,
                        "已为邀请人生成对应奖励记录"
                    );
                }
                Some((counterpart, appended))
            }
            _ => None,
        };

        Ok(DispatchOutcome {
            applied,
            counterpart,
        })
    }
}
