//! 奖励资格校验服务
//!
//! 调用方可触发的奖励入口都在这里校验，校验通过后只向账本追加一条种子记录，
//! 积分入账和邀请人奖励由派发中继异步完成。
//!
//! ## 直播邀请奖励流程
//!
//! 1. 参数检查 -> 2. 推荐码解析（未知码与自己的码同等对待）
//!    -> 3. 直播存在且正在直播 -> 4. 调用方已报名
//!    -> 5. 已领取检查 -> 6. 追加种子记录（并发领取由主键去重兜底）
//!
//! 所有前置条件失败对调用方只表现为同一个笼统错误，具体原因只写服务端日志。
//!
//! 直播内活跃行为先做已记录检查，再校验直播状态和报名。

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};
use validator::Validate;

use reward_shared::observability::metrics;

use crate::error::{LedgerError, PolicyReason, Result};
use crate::models::{AppendOutcome, Livestream, RewardRecord, UserProfile};
use crate::repository::{
    LivestreamRepositoryTrait, RewardLedgerRepositoryTrait, UserRepositoryTrait,
};
use crate::service::dto::{
    ClaimAttendanceRequest, RegistrationRequest, RegistrationResponse, UserActionRequest,
};
use crate::taxonomy::RewardAction;

/// 缺少必要参数时返回给调用方的提示
pub const REQUIRED_DATA_MISSING: &str = "Required data not present";

/// 无法识别的动作
pub const UNKNOWN_ACTION: &str = "Unknown action";

/// 奖励资格校验服务
pub struct RewardGatekeeper {
    ledger: Arc<dyn RewardLedgerRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
    livestreams: Arc<dyn LivestreamRepositoryTrait>,
}

impl RewardGatekeeper {
    pub fn new(
        ledger: Arc<dyn RewardLedgerRepositoryTrait>,
        users: Arc<dyn UserRepositoryTrait>,
        livestreams: Arc<dyn LivestreamRepositoryTrait>,
    ) -> Self {
        Self {
            ledger,
            users,
            livestreams,
        }
    }

    /// 领取直播邀请奖励
    ///
    /// 成功时返回写入的种子记录，不等待级联完成。
    #[instrument(skip(self, request), fields(livestream_id = %request.livestream_id))]
    pub async fn claim_livestream_attendance(
        &self,
        caller: Option<&str>,
        request: &ClaimAttendanceRequest,
    ) -> Result<RewardRecord> {
        let started = Instant::now();
        let result = self.claim_livestream_attendance_inner(caller, request).await;
        observe("claimLivestreamAttendance", &result, started);
        result
    }

    async fn claim_livestream_attendance_inner(
        &self,
        caller: Option<&str>,
        request: &ClaimAttendanceRequest,
    ) -> Result<RewardRecord> {
        let caller = require_caller(caller)?;
        request
            .validate()
            .map_err(|_| LedgerError::InvalidArgument(REQUIRED_DATA_MISSING.to_string()))?;

        let inviter = self
            .resolve_referrer(caller, &request.referral_code)
            .await?;

        let livestream = self.require_livestream(&request.livestream_id).await?;
        if !livestream.is_test {
            if !livestream.is_live() {
                return Err(deny(caller, PolicyReason::LivestreamNotLive));
            }
            self.require_registration(&livestream, caller).await?;
        }

        let record = RewardRecord::issue(
            caller,
            RewardAction::LivestreamInviteCompleteFollower,
            Some(inviter.user_id),
            Some(livestream.id),
        )?;

        self.append_seed(record).await
    }

    /// 上报直播内的活跃行为（参加、提问、举手）
    ///
    /// 每场直播每种行为只记一次；参加直播要求直播正在进行。
    #[instrument(skip(self, request), fields(action = %request.action))]
    pub async fn reward_user_action(
        &self,
        caller: Option<&str>,
        request: &UserActionRequest,
    ) -> Result<RewardRecord> {
        let started = Instant::now();
        let result = self.reward_user_action_inner(caller, request).await;
        observe("rewardUserAction", &result, started);
        result
    }

    async fn reward_user_action_inner(
        &self,
        caller: Option<&str>,
        request: &UserActionRequest,
    ) -> Result<RewardRecord> {
        let caller = require_caller(caller)?;
        request
            .validate()
            .map_err(|_| LedgerError::InvalidArgument(REQUIRED_DATA_MISSING.to_string()))?;

        let action: RewardAction = request
            .action
            .parse()
            .map_err(|_| LedgerError::InvalidArgument(UNKNOWN_ACTION.to_string()))?;
        if !action.is_user_activity() {
            return Err(deny(caller, PolicyReason::ActionNotAllowed));
        }

        let livestream_id = request
            .livestream_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| deny(caller, PolicyReason::LivestreamMissing))?;

        // 已记录过的行为直接报重复，不受直播之后结束的影响
        let record =
            RewardRecord::issue(caller, action, None, Some(livestream_id.to_string()))?;
        self.ensure_unclaimed(&record).await?;

        let livestream = self.require_livestream(livestream_id).await?;
        if !livestream.is_test {
            if action == RewardAction::LivestreamUserAttended && !livestream.is_live() {
                return Err(deny(caller, PolicyReason::LivestreamNotLive));
            }
            self.require_registration(&livestream, caller).await?;
        }

        self.insert_seed(record).await
    }

    /// 报名直播后的邀请奖励
    ///
    /// 只有邀请信息完整、指向本场直播且属于其他已存在用户时才发放；
    /// 否则静默跳过。重复调用不报错。
    #[instrument(skip(self, request), fields(livestream_id = %request.livestream_id))]
    pub async fn reward_livestream_registration(
        &self,
        caller: Option<&str>,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse> {
        let started = Instant::now();
        let result = self.reward_livestream_registration_inner(caller, request).await;
        observe("rewardLivestreamRegistration", &result, started);
        result
    }

    async fn reward_livestream_registration_inner(
        &self,
        caller: Option<&str>,
        request: &RegistrationRequest,
    ) -> Result<RegistrationResponse> {
        const SKIPPED: RegistrationResponse = RegistrationResponse { rewarded: false };

        let caller = require_caller(caller)?;
        request
            .validate()
            .map_err(|_| LedgerError::InvalidArgument(REQUIRED_DATA_MISSING.to_string()))?;

        let livestream = self.require_livestream(&request.livestream_id).await?;
        if !livestream.is_test {
            self.require_registration(&livestream, caller).await?;
        }

        let Some(referral) = request
            .referral
            .as_ref()
            .filter(|r| !r.referral_code.trim().is_empty())
        else {
            return Ok(SKIPPED);
        };
        if referral.invite_livestream.as_deref() != Some(livestream.id.as_str()) {
            info!(caller, "邀请链接指向其他直播，跳过报名奖励");
            return Ok(SKIPPED);
        }

        let inviter = match self.users.get_by_referral_code(&referral.referral_code).await? {
            Some(inviter) if inviter.user_id != caller => inviter,
            _ => {
                info!(caller, "邀请人无效，跳过报名奖励");
                return Ok(SKIPPED);
            }
        };

        let record = RewardRecord::issue(
            caller,
            RewardAction::LivestreamRegisterCompleteFollower,
            Some(inviter.user_id),
            Some(livestream.id),
        )?;

        match self.ledger.append(&record).await? {
            AppendOutcome::Created => {
                info!(caller, reward_id = %record.id, "报名奖励记录已写入");
                Ok(RegistrationResponse { rewarded: true })
            }
            AppendOutcome::AlreadyExists => Ok(SKIPPED),
        }
    }

    /// 解析推荐码，未知码和调用方自己的码都视为前置条件失败
    async fn resolve_referrer(&self, caller: &str, referral_code: &str) -> Result<UserProfile> {
        match self.users.get_by_referral_code(referral_code).await? {
            None => Err(deny(caller, PolicyReason::UnknownReferralCode)),
            Some(inviter) if inviter.user_id == caller => {
                Err(deny(caller, PolicyReason::SelfReferral))
            }
            Some(inviter) => Ok(inviter),
        }
    }

    async fn require_livestream(&self, livestream_id: &str) -> Result<Livestream> {
        self.livestreams
            .get_livestream(livestream_id)
            .await?
            .ok_or_else(|| {
                warn!(livestream_id, reason = %PolicyReason::LivestreamNotFound, "奖励请求被拒绝");
                LedgerError::policy(PolicyReason::LivestreamNotFound)
            })
    }

    async fn require_registration(&self, livestream: &Livestream, caller: &str) -> Result<()> {
        if self.livestreams.is_registered(&livestream.id, caller).await? {
            Ok(())
        } else {
            Err(deny(caller, PolicyReason::NotRegistered))
        }
    }

    /// 写入种子记录
    ///
    /// 先查后写挡住大多数重复请求，写入时的主键冲突兜住并发竞争。
    async fn append_seed(&self, record: RewardRecord) -> Result<RewardRecord> {
        self.ensure_unclaimed(&record).await?;
        self.insert_seed(record).await
    }

    async fn ensure_unclaimed(&self, record: &RewardRecord) -> Result<()> {
        if self
            .ledger
            .get(&record.owner_user_id, &record.id)
            .await?
            .is_some()
        {
            return Err(duplicate_of(record));
        }
        Ok(())
    }

    async fn insert_seed(&self, record: RewardRecord) -> Result<RewardRecord> {
        match self.ledger.append(&record).await? {
            AppendOutcome::Created => {
                info!(
                    user_id = %record.owner_user_id,
                    action = %record.action,
                    reward_id = %record.id,
                    "奖励种子记录已写入"
                );
                Ok(record)
            }
            AppendOutcome::AlreadyExists => Err(duplicate_of(&record)),
        }
    }
}

fn duplicate_of(record: &RewardRecord) -> LedgerError {
    LedgerError::DuplicateClaim {
        user_id: record.owner_user_id.clone(),
        action: record.action,
    }
}

/// 调用方身份缺失或为空时视为缺参
pub(crate) fn require_caller(caller: Option<&str>) -> Result<&str> {
    caller
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LedgerError::InvalidArgument(REQUIRED_DATA_MISSING.to_string()))
}

fn deny(caller: &str, reason: PolicyReason) -> LedgerError {
    warn!(caller, %reason, "奖励请求被拒绝");
    LedgerError::policy(reason)
}

fn observe<T>(rpc: &str, result: &Result<T>, started: Instant) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.error_code(),
    };
    metrics::record_claim(rpc, outcome, started.elapsed().as_secs_f64());
}
