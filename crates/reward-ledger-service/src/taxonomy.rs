//! 奖励动作分类表
//!
//! 每种奖励动作的积分、描述、级联目标、幂等键范围和聚合副作用都登记在
//! 一张静态表中，运行期不可修改。级联深度固定为一层：
//! `_FOLLOWER` 动作最多派生一条 `_LEADER` 动作，`_LEADER` 动作必须是终止动作，
//! 这一点由编译期断言保证。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 奖励动作
///
/// 枚举判别值即 [`ACTION_TABLE`] 中的下标，新增动作时两处必须同步。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardAction {
    /// 通过推荐码完成注册（被推荐人）
    ReferralSignupFollower = 0,
    /// 推荐的用户完成注册（推荐人）
    ReferralSignupLeader = 1,
    /// 通过邀请参加直播（被邀请人）
    LivestreamInviteCompleteFollower = 2,
    /// 邀请的用户参加了直播（邀请人）
    LivestreamInviteCompleteLeader = 3,
    /// 通过邀请报名直播（被邀请人）
    LivestreamRegisterCompleteFollower = 4,
    /// 邀请的用户报名了直播（邀请人）
    LivestreamRegisterCompleteLeader = 5,
    /// 参加直播
    LivestreamUserAttended = 6,
    /// 在直播中提问
    LivestreamUserAskedQuestion = 7,
    /// 在直播中举手
    LivestreamUserHandRaised = 8,
}

/// 用户活跃度统计项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserStat {
    TotalLivestreamInvites,
    TotalLivestreamAttendances,
    TotalQuestionsAsked,
    TotalHandRaises,
}

impl UserStat {
    /// 对应 user_points 表中的列名
    pub fn column(self) -> &'static str {
        match self {
            Self::TotalLivestreamInvites => "total_livestream_invites",
            Self::TotalLivestreamAttendances => "total_livestream_attendances",
            Self::TotalQuestionsAsked => "total_questions_asked",
            Self::TotalHandRaises => "total_hand_raises",
        }
    }
}

/// 入账时对积分聚合产生的附加影响
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateEffect {
    None,
    /// 推荐人数 +1
    ReferralCount,
    /// 某项活跃度统计 +1
    Stat(UserStat),
}

/// 幂等键的组成范围
///
/// 同一个自然元组只会生成同一个记录 ID，从而在存储层去重。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// (用户, 动作)：一生只发一次
    Once,
    /// (用户, 动作, 直播)
    PerLivestream,
    /// (用户, 动作, 关联用户)
    PerRelatedUser,
    /// (用户, 动作, 直播, 关联用户)
    PerLivestreamAndRelatedUser,
}

impl KeyScope {
    pub fn needs_livestream(self) -> bool {
        matches!(self, Self::PerLivestream | Self::PerLivestreamAndRelatedUser)
    }

    pub fn needs_related_user(self) -> bool {
        matches!(self, Self::PerRelatedUser | Self::PerLivestreamAndRelatedUser)
    }
}

/// 动作定义
#[derive(Debug, Clone, Copy)]
pub struct ActionKind {
    pub action: RewardAction,
    pub points: i64,
    pub description: &'static str,
    /// 级联目标，`None` 表示终止动作
    pub cascade: Option<RewardAction>,
    pub key_scope: KeyScope,
    pub effect: AggregateEffect,
}

const ACTION_TABLE: [ActionKind; 9] = [
    ActionKind {
        action: RewardAction::ReferralSignupFollower,
        points: 20,
        description: "Signed up with a referral code",
        cascade: Some(RewardAction::ReferralSignupLeader),
        key_scope: KeyScope::Once,
        effect: AggregateEffect::None,
    },
    ActionKind {
        action: RewardAction::ReferralSignupLeader,
        points: 20,
        description: "A referred friend signed up",
        cascade: None,
        key_scope: KeyScope::PerRelatedUser,
        effect: AggregateEffect::ReferralCount,
    },
    ActionKind {
        action: RewardAction::LivestreamInviteCompleteFollower,
        points: 20,
        description: "Attended a livestream through an invite",
        cascade: Some(RewardAction::LivestreamInviteCompleteLeader),
        key_scope: KeyScope::PerLivestream,
        effect: AggregateEffect::None,
    },
    ActionKind {
        action: RewardAction::LivestreamInviteCompleteLeader,
        points: 20,
        description: "An invited friend attended a livestream",
        cascade: None,
        key_scope: KeyScope::PerLivestreamAndRelatedUser,
        effect: AggregateEffect::Stat(UserStat::TotalLivestreamInvites),
    },
    ActionKind {
        action: RewardAction::LivestreamRegisterCompleteFollower,
        points: 0,
        description: "Registered for a livestream through an invite",
        cascade: None,
        key_scope: KeyScope::PerLivestream,
        effect: AggregateEffect::None,
    },
    ActionKind {
        action: RewardAction::LivestreamRegisterCompleteLeader,
        points: 0,
        description: "An invited friend registered for a livestream",
        cascade: None,
        key_scope: KeyScope::PerLivestreamAndRelatedUser,
        effect: AggregateEffect::None,
    },
    ActionKind {
        action: RewardAction::LivestreamUserAttended,
        points: 0,
        description: "Attended a livestream",
        cascade: None,
        key_scope: KeyScope::PerLivestream,
        effect: AggregateEffect::Stat(UserStat::TotalLivestreamAttendances),
    },
    ActionKind {
        action: RewardAction::LivestreamUserAskedQuestion,
        points: 0,
        description: "Asked a question during a livestream",
        cascade: None,
        key_scope: KeyScope::PerLivestream,
        effect: AggregateEffect::Stat(UserStat::TotalQuestionsAsked),
    },
    ActionKind {
        action: RewardAction::LivestreamUserHandRaised,
        points: 0,
        description: "Raised a hand during a livestream",
        cascade: None,
        key_scope: KeyScope::PerLivestream,
        effect: AggregateEffect::Stat(UserStat::TotalHandRaises),
    },
];

static ACTION_KINDS: [ActionKind; 9] = ACTION_TABLE;

/// 校验表的下标与判别值一致，且所有级联目标都是终止动作
const fn cascade_is_single_level(table: &[ActionKind]) -> bool {
    let mut i = 0;
    while i < table.len() {
        if table[i].action as usize != i {
            return false;
        }
        if let Some(target) = table[i].cascade {
            let t = target as usize;
            if t >= table.len() || table[t].cascade.is_some() {
                return false;
            }
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    cascade_is_single_level(&ACTION_TABLE),
    "reward cascade must be exactly one level deep"
);

impl RewardAction {
    /// 分类表中该动作的定义
    pub fn kind(self) -> &'static ActionKind {
        &ACTION_KINDS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReferralSignupFollower => "REFERRAL_SIGNUP_FOLLOWER",
            Self::ReferralSignupLeader => "REFERRAL_SIGNUP_LEADER",
            Self::LivestreamInviteCompleteFollower => "LIVESTREAM_INVITE_COMPLETE_FOLLOWER",
            Self::LivestreamInviteCompleteLeader => "LIVESTREAM_INVITE_COMPLETE_LEADER",
            Self::LivestreamRegisterCompleteFollower => "LIVESTREAM_REGISTER_COMPLETE_FOLLOWER",
            Self::LivestreamRegisterCompleteLeader => "LIVESTREAM_REGISTER_COMPLETE_LEADER",
            Self::LivestreamUserAttended => "LIVESTREAM_USER_ATTENDED",
            Self::LivestreamUserAskedQuestion => "LIVESTREAM_USER_ASKED_QUESTION",
            Self::LivestreamUserHandRaised => "LIVESTREAM_USER_HAND_RAISED",
        }
    }

    /// 是否为用户自行上报的活跃度动作
    pub fn is_user_activity(self) -> bool {
        matches!(
            self,
            Self::LivestreamUserAttended
                | Self::LivestreamUserAskedQuestion
                | Self::LivestreamUserHandRaised
        )
    }
}

impl fmt::Display for RewardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的动作标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reward action: {}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for RewardAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTION_KINDS
            .iter()
            .map(|kind| kind.action)
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// 按标识查找动作定义
pub fn lookup(action_id: &str) -> Option<&'static ActionKind> {
    action_id.parse::<RewardAction>().ok().map(RewardAction::kind)
}

/// 全部动作定义，按表顺序
pub fn all() -> &'static [ActionKind] {
    &ACTION_KINDS
}
