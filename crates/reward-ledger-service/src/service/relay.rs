//! 账本派发中继
//!
//! 账本表本身充当发件箱：新写入的记录 `dispatched_at` 为空，
//! 中继定期取出一批交给 [`CascadeDispatcher`]，成功后标记已派发，
//! 失败则累加失败次数，留待下一轮重投。取批次时失败次数少的记录优先，
//! 持续失败的记录不会挡住新写入的记录。
//!
//! 单次派发内对瞬时故障做指数退避重试；记录本身有问题（不可重试）时直接计一次失败。
//! 累计失败达到告警阈值后按 error 级别记录；达到 `max_dispatch_attempts`
//! 后不再自动重投，记录留在账本中等待人工处理。

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use reward_shared::config::RelayConfig;
use reward_shared::observability::metrics;
use reward_shared::retry::{RetryPolicy, retry_with_policy};

use crate::error::{LedgerError, Result};
use crate::models::PendingDispatch;
use crate::repository::RewardLedgerRepositoryTrait;
use crate::service::dispatcher::CascadeDispatcher;

/// 同一批内并发派发的上限
const MAX_CONCURRENT_DISPATCHES: usize = 16;

/// 一轮轮询的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayBatchReport {
    pub fetched: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// 账本派发中继
pub struct DispatchRelay {
    ledger: Arc<dyn RewardLedgerRepositoryTrait>,
    dispatcher: Arc<CascadeDispatcher>,
    config: RelayConfig,
    retry_policy: RetryPolicy,
}

impl DispatchRelay {
    pub fn new(
        ledger: Arc<dyn RewardLedgerRepositoryTrait>,
        dispatcher: Arc<CascadeDispatcher>,
        config: RelayConfig,
    ) -> Self {
        let retry_policy = config.retry_policy();
        Self {
            ledger,
            dispatcher,
            config,
            retry_policy,
        }
    }

    /// 轮询循环，直到收到关闭信号
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            batch_size = self.config.batch_size,
            max_dispatch_attempts = self.config.max_dispatch_attempts,
            "账本派发中继已启动"
        );

        loop {
            tokio::select! {
                // 偏向关闭信号，保证收到关闭时能尽快退出
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("收到关闭信号，账本派发中继退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.fetched > 0 => {
                            debug!(
                                fetched = report.fetched,
                                delivered = report.delivered,
                                failed = report.failed,
                                "本轮派发完成"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "读取未派发记录失败"),
                    }
                }
            }
        }
    }

    /// 派发一批未派发记录
    pub async fn run_once(&self) -> Result<RelayBatchReport> {
        let pending = self
            .ledger
            .list_undispatched(self.config.batch_size, self.config.max_dispatch_attempts)
            .await?;
        let fetched = pending.len();
        metrics::set_relay_backlog(fetched);

        if fetched == 0 {
            return Ok(RelayBatchReport::default());
        }

        let delivered = stream::iter(pending)
            .map(|p| self.deliver(p))
            .buffer_unordered(MAX_CONCURRENT_DISPATCHES)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        Ok(RelayBatchReport {
            fetched,
            delivered,
            failed: fetched - delivered,
        })
    }

    /// 反复派发直到取不出待派发记录
    ///
    /// 持续失败的记录每轮累加一次失败，达到上限后不再取出，因此循环必然结束。
    /// 返回累计派发成功的条数。
    pub async fn drain(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let report = self.run_once().await?;
            total += report.delivered;
            if report.fetched == 0 {
                return Ok(total);
            }
        }
    }

    async fn deliver(&self, pending: PendingDispatch) -> bool {
        let record = &pending.record;
        let result = retry_with_policy(
            &self.retry_policy,
            "dispatch_reward",
            LedgerError::is_retryable,
            || self.dispatcher.dispatch(record),
        )
        .await;

        match result {
            Ok(_) => match self.ledger.mark_dispatched(&record.id).await {
                Ok(()) => true,
                Err(e) => {
                    // 下一轮会重投，入账和级联都是幂等的
                    warn!(reward_id = %record.id, error = %e, "标记已派发失败");
                    false
                }
            },
            Err(e) => {
                self.note_failure(&pending, &e).await;
                false
            }
        }
    }

    async fn note_failure(&self, pending: &PendingDispatch, err: &LedgerError) {
        let record = &pending.record;
        match self.ledger.record_dispatch_failure(&record.id).await {
            Ok(attempts) if attempts >= self.config.max_dispatch_attempts => {
                error!(
                    reward_id = %record.id,
                    owner = %record.owner_user_id,
                    action = %record.action,
                    attempts,
                    error = %err,
                    "账本记录达到派发上限，停止自动重投"
                );
            }
            Ok(attempts) if attempts >= self.config.alert_after_attempts => {
                error!(
                    reward_id = %record.id,
                    owner = %record.owner_user_id,
                    action = %record.action,
                    attempts,
                    error = %err,
                    "账本记录持续派发失败，需要人工介入"
                );
            }
            Ok(attempts) => {
                warn!(
                    reward_id = %record.id,
                    action = %record.action,
                    attempts,
                    error = %err,
                    "账本记录派发失败，将在下一轮重试"
                );
            }
            Err(e) => {
                error!(reward_id = %record.id, error = %e, "记录派发失败次数时出错");
            }
        }
    }
}
