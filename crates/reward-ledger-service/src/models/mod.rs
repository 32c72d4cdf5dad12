//! 奖励账本领域模型

pub mod directory;
pub mod points;
pub mod reward;

// 重新导出常用类型
pub use directory::{Livestream, UserProfile};
pub use points::{ApplyOutcome, PointsDelta, UserPointsAggregate};
pub use reward::{AppendOutcome, PendingDispatch, RewardRecord};
