//! 奖励账本服务
//!
//! 记录用户在直播邀请、推荐注册和直播互动中获得的奖励，并维护每个用户的积分聚合。
//!
//! ## 核心功能
//!
//! - **资格校验**：调用方触发的奖励在写入前校验推荐码、直播状态和报名情况
//! - **确定性账本**：奖励 ID 由所有者、动作和作用域推导，重复领取天然冲突
//! - **级联派发**：每条记录入账一次，并按动作表为相关用户写入对应记录
//! - **积分聚合**：只通过原子增量维护，重投不会重复计分
//!
//! ## 模块结构
//!
//! - `taxonomy`: 奖励动作表
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 存储层（PostgreSQL 与内存实现）
//! - `service`: 资格校验、派发、中继和查询
//! - `api`: HTTP 接口

pub mod api;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod taxonomy;

pub use error::{LedgerError, PolicyReason, Result};
pub use models::*;
pub use service::{
    CascadeDispatcher, DispatchRelay, RewardGatekeeper, RewardQueryService, dto,
};
pub use taxonomy::{ActionKind, RewardAction};
