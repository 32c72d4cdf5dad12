//! 服务层
//!
//! - [`gatekeeper`]：调用方触发的奖励入口及其资格校验
//! - [`dispatcher`]：单条账本记录的入账与级联
//! - [`relay`]：轮询未派发记录并交给派发器
//! - [`query_service`]：只读查询

pub mod dispatcher;
pub mod dto;
pub mod gatekeeper;
pub mod query_service;
pub mod relay;

pub use dispatcher::{CascadeDispatcher, DispatchOutcome};
pub use gatekeeper::RewardGatekeeper;
pub use query_service::RewardQueryService;
pub use relay::{DispatchRelay, RelayBatchReport};
