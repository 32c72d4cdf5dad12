//! PostgreSQL 连接池
//!
//! 只负责按配置建池和退出时关闭，迁移和仓储装配由服务入口完成。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// 服务持有的连接池
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip_all, fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = pool_options(config).connect(&config.url).await?;
        info!(
            min_connections = config.min_connections,
            "数据库连接池已建立"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 等待借出的连接归还后关闭连接池
    pub async fn close(self) {
        self.pool.close().await;
        info!("数据库连接池已关闭");
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
}
