//! 级联派发幂等性测试
//!
//! 派发按至少一次投递设计：同一条记录重复派发不得重复计分，
//! 也不得重复生成邀请人记录。

mod common;

use std::sync::Arc;

use common::*;
use reward_ledger::models::{AppendOutcome, ApplyOutcome, RewardRecord};
use reward_ledger::repository::RewardLedgerRepositoryTrait;
use reward_ledger::taxonomy::{self, RewardAction};

/// 外部注册流程写入的推荐注册种子记录
fn referral_signup_seed() -> RewardRecord {
    RewardRecord::issue(
        FOLLOWER,
        RewardAction::ReferralSignupFollower,
        Some(LEADER.to_string()),
        None,
    )
    .unwrap()
}

#[tokio::test]
async fn test_redelivered_seed_credits_points_once() {
    let h = Harness::new();
    let seed = referral_signup_seed();
    assert_eq!(h.store.append(&seed).await.unwrap(), AppendOutcome::Created);

    let first = h.dispatcher.dispatch(&seed).await.unwrap();
    assert_eq!(first.applied, ApplyOutcome::Applied);
    let (counterpart, appended) = first.counterpart.clone().unwrap();
    assert_eq!(appended, AppendOutcome::Created);
    assert_eq!(counterpart.action, RewardAction::ReferralSignupLeader);
    assert_eq!(counterpart.owner_user_id, LEADER);

    for _ in 0..3 {
        let again = h.dispatcher.dispatch(&seed).await.unwrap();
        assert_eq!(again.applied, ApplyOutcome::AlreadyApplied);
        let (_, appended) = again.counterpart.unwrap();
        assert_eq!(appended, AppendOutcome::AlreadyExists);
    }

    assert_eq!(h.points_of(FOLLOWER).await, 20);
    assert_eq!(h.store.reward_count(), 2);
}

/// 邀请人记录重复派发时推荐人数只加一次
#[tokio::test]
async fn test_referral_leader_counted_once_under_redelivery() {
    let h = Harness::new();
    let seed = referral_signup_seed();
    h.store.append(&seed).await.unwrap();
    let (leader_record, _) = h.dispatcher.dispatch(&seed).await.unwrap().counterpart.unwrap();

    let first = h.dispatcher.dispatch(&leader_record).await.unwrap();
    let second = h.dispatcher.dispatch(&leader_record).await.unwrap();
    assert_eq!(first.applied, ApplyOutcome::Applied);
    assert_eq!(second.applied, ApplyOutcome::AlreadyApplied);
    assert!(second.counterpart.is_none());

    let leader = h.queries.get_points(Some(LEADER)).await.unwrap();
    assert_eq!(leader.referrals_count, 1);
    assert_eq!(leader.total_points, 20);
}

/// 中继和手工重投交错进行，最终状态与单次派发一致
#[tokio::test]
async fn test_relay_converges_after_manual_redelivery() {
    let h = Harness::new();
    let seed = referral_signup_seed();
    h.store.append(&seed).await.unwrap();

    // 派发成功但未标记，相当于标记前进程崩溃
    h.dispatcher.dispatch(&seed).await.unwrap();
    assert_eq!(h.store.undispatched_count(), 2);

    let delivered = h.relay.drain().await.unwrap();
    assert_eq!(delivered, 2);
    assert_eq!(h.store.undispatched_count(), 0);

    assert_eq!(h.points_of(FOLLOWER).await, 20);
    let leader = h.queries.get_points(Some(LEADER)).await.unwrap();
    assert_eq!(leader.total_points, 20);
    assert_eq!(leader.referrals_count, 1);
}

/// 多个跟随者同时触发同一邀请人的级联，积分不丢失
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cascades_to_same_leader_do_not_lose_updates() {
    let h = Harness::new();
    let followers: Vec<String> = (0..20).map(|i| format!("f{i}@example.com")).collect();

    let mut seeds = Vec::new();
    for follower in &followers {
        let seed = RewardRecord::issue(
            follower.as_str(),
            RewardAction::LivestreamInviteCompleteFollower,
            Some(LEADER.to_string()),
            Some(LIVE.to_string()),
        )
        .unwrap();
        h.store.append(&seed).await.unwrap();
        seeds.push(seed);
    }

    let mut handles = Vec::new();
    for seed in seeds {
        let dispatcher = Arc::clone(&h.dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher.dispatch(&seed).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    h.relay.drain().await.unwrap();

    let leader = h.queries.get_points(Some(LEADER)).await.unwrap();
    assert_eq!(leader.total_points, 20 * followers.len() as i64);
    assert_eq!(leader.total_livestream_invites, followers.len() as i64);
    for follower in &followers {
        assert_eq!(h.points_of(follower).await, 20);
    }
}

/// 级联只有一层：派发邀请人记录不会再生成新记录
#[tokio::test]
async fn test_cascade_terminates_after_one_level() {
    let h = Harness::new();
    let seed = RewardRecord::issue(
        FOLLOWER,
        RewardAction::LivestreamInviteCompleteFollower,
        Some(LEADER.to_string()),
        Some(LIVE.to_string()),
    )
    .unwrap();
    h.store.append(&seed).await.unwrap();

    h.relay.drain().await.unwrap();
    // 再跑几轮也不会有新记录
    h.relay.drain().await.unwrap();
    assert_eq!(h.store.reward_count(), 2);

    for kind in taxonomy::all() {
        if let Some(target) = kind.cascade {
            assert!(target.kind().cascade.is_none());
        }
    }
}

/// 缺少邀请人的种子记录持续失败，但不影响其他记录
#[tokio::test]
async fn test_malformed_seed_does_not_block_relay() {
    let h = Harness::new();

    let mut broken = referral_signup_seed();
    broken.related_user_id = None;
    h.store.append(&broken).await.unwrap();

    let good = RewardRecord::issue(
        FOLLOWER,
        RewardAction::LivestreamUserHandRaised,
        None,
        Some(LIVE.to_string()),
    )
    .unwrap();
    h.store.append(&good).await.unwrap();

    h.relay.drain().await.unwrap();

    assert_eq!(h.store.undispatched_count(), 1);
    assert!(h.store.dispatch_attempts(&broken.id).unwrap() >= 1);
    assert_eq!(h.points_of(FOLLOWER).await, 0);

    let aggregate = h.queries.get_points(Some(FOLLOWER)).await.unwrap();
    assert_eq!(aggregate.total_hand_raises, 1);
}

/// 一整批以上的持续失败记录排在前面时，后写入的正常记录仍能派发
#[tokio::test]
async fn test_failing_records_filling_a_batch_do_not_starve_relay() {
    let h = Harness::new();
    let batch_size = fast_relay().batch_size as usize;
    let earlier = chrono::Utc::now() - chrono::Duration::minutes(1);

    let mut broken_ids = Vec::new();
    for i in 0..batch_size {
        let mut broken = RewardRecord::issue(
            format!("f{i}@example.com"),
            RewardAction::ReferralSignupFollower,
            Some(LEADER.to_string()),
            None,
        )
        .unwrap();
        broken.related_user_id = None;
        broken.created_at = earlier;
        h.store.append(&broken).await.unwrap();
        broken_ids.push(broken.id);
    }

    let good = RewardRecord::issue(
        FOLLOWER,
        RewardAction::LivestreamUserHandRaised,
        None,
        Some(LIVE.to_string()),
    )
    .unwrap();
    h.store.append(&good).await.unwrap();

    let delivered = h.relay.drain().await.unwrap();
    assert_eq!(delivered, 1);

    let aggregate = h.queries.get_points(Some(FOLLOWER)).await.unwrap();
    assert_eq!(aggregate.total_hand_raises, 1);

    // 失败记录停在上限，不再被取出
    let ceiling = fast_relay().max_dispatch_attempts;
    assert_eq!(h.store.undispatched_count(), batch_size);
    for id in &broken_ids {
        assert_eq!(h.store.dispatch_attempts(id), Some(ceiling));
    }
    assert_eq!(h.relay.drain().await.unwrap(), 0);
    assert_eq!(h.store.dispatch_attempts(&broken_ids[0]), Some(ceiling));
}
