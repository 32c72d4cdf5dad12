//! 奖励查询服务
//!
//! 提供只读查询：动作说明、调用方的积分聚合和最近的账本记录。

use std::sync::Arc;

use tracing::instrument;

use crate::error::Result;
use crate::models::UserPointsAggregate;
use crate::repository::{RewardLedgerRepositoryTrait, UserPointsRepositoryTrait};
use crate::service::dto::{ActionKindDto, RewardEntryDto};
use crate::service::gatekeeper::require_caller;
use crate::taxonomy;

/// 账本记录默认返回条数
pub const DEFAULT_LIST_LIMIT: i64 = 20;
/// 账本记录单次返回上限
pub const MAX_LIST_LIMIT: i64 = 100;

/// 奖励查询服务
pub struct RewardQueryService {
    ledger: Arc<dyn RewardLedgerRepositoryTrait>,
    points: Arc<dyn UserPointsRepositoryTrait>,
}

impl RewardQueryService {
    pub fn new(
        ledger: Arc<dyn RewardLedgerRepositoryTrait>,
        points: Arc<dyn UserPointsRepositoryTrait>,
    ) -> Self {
        Self { ledger, points }
    }

    /// 全部奖励动作及其积分
    pub fn list_action_kinds(&self) -> Vec<ActionKindDto> {
        taxonomy::all().iter().map(ActionKindDto::from).collect()
    }

    #[instrument(skip(self))]
    pub async fn get_points(&self, caller: Option<&str>) -> Result<UserPointsAggregate> {
        let caller = require_caller(caller)?;
        self.points.get(caller).await
    }

    /// 调用方最近的账本记录，按时间倒序
    #[instrument(skip(self))]
    pub async fn list_rewards(
        &self,
        caller: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<RewardEntryDto>> {
        let caller = require_caller(caller)?;
        let limit = limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let records = self.ledger.list_by_owner(caller, limit).await?;
        Ok(records.into_iter().map(RewardEntryDto::from).collect())
    }
}
