//! 数据库仓储层
//!
//! 提供账本、积分聚合、用户目录和直播的数据访问接口。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 去重依赖存储层的主键约束，而不是先查后写
//! - 聚合只通过原子增量修改
//! - 定义 trait 接口以支持 mock 测试和内存后端

mod directory_repo;
mod ledger_repo;
mod memory;
mod points_repo;
mod traits;

pub use directory_repo::{LivestreamRepository, UserRepository};
pub use ledger_repo::RewardLedgerRepository;
pub use memory::InMemoryStore;
pub use points_repo::UserPointsRepository;
pub use traits::*;
