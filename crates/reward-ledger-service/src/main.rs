//! 奖励账本服务
//!
//! 对外提供 HTTP 可调用接口，后台运行账本派发中继。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use reward_shared::{
    config::{AppConfig, StorageBackend},
    database::Database,
    observability,
};

use reward_ledger::{
    api::{self, AppState, JwtVerifier},
    repository::{
        InMemoryStore, LivestreamRepository, LivestreamRepositoryTrait, RewardLedgerRepository,
        RewardLedgerRepositoryTrait, UserPointsRepository, UserPointsRepositoryTrait,
        UserRepository, UserRepositoryTrait,
    },
    service::{CascadeDispatcher, DispatchRelay, RewardGatekeeper, RewardQueryService},
};

const SERVICE_NAME: &str = "reward-ledger-service";

/// 按存储后端装配的仓储集合
struct Repositories {
    ledger: Arc<dyn RewardLedgerRepositoryTrait>,
    points: Arc<dyn UserPointsRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
    livestreams: Arc<dyn LivestreamRepositoryTrait>,
    /// 内存后端时为空
    database: Option<Database>,
}

impl Repositories {
    async fn connect(config: &AppConfig) -> Result<Self> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let db = Database::connect(&config.database).await?;
                let pool = db.pool().clone();

                if config.database.run_migrations {
                    sqlx::migrate!("./migrations").run(&pool).await?;
                    info!("Database migrations applied");
                }

                Ok(Self {
                    ledger: Arc::new(RewardLedgerRepository::new(pool.clone())),
                    points: Arc::new(UserPointsRepository::new(pool.clone())),
                    users: Arc::new(UserRepository::new(pool.clone())),
                    livestreams: Arc::new(LivestreamRepository::new(pool)),
                    database: Some(db),
                })
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage, data is lost on restart");
                let store = InMemoryStore::new();
                Ok(Self {
                    ledger: Arc::new(store.clone()),
                    points: Arc::new(store.clone()),
                    users: Arc::new(store.clone()),
                    livestreams: Arc::new(store),
                    database: None,
                })
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    // 2. 初始化可观测性
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        backend = ?config.storage.backend,
        "Starting {}...",
        SERVICE_NAME
    );

    // 3. 存储
    let repos = Repositories::connect(&config).await?;

    // 4. 服务
    let dispatcher = Arc::new(CascadeDispatcher::new(
        repos.ledger.clone(),
        repos.points.clone(),
    ));
    let gatekeeper = Arc::new(RewardGatekeeper::new(
        repos.ledger.clone(),
        repos.users.clone(),
        repos.livestreams.clone(),
    ));
    let queries = Arc::new(RewardQueryService::new(
        repos.ledger.clone(),
        repos.points.clone(),
    ));
    let relay = DispatchRelay::new(repos.ledger.clone(), dispatcher, config.relay.clone());
    info!("Services initialized");

    // 5. 后台中继
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_handle = tokio::spawn(async move { relay.run(shutdown_rx).await });

    // 6. HTTP 服务
    let state = AppState {
        gatekeeper,
        queries,
        jwt: Arc::new(JwtVerifier::new(&config.auth)),
    };
    let app = api::router(
        state,
        Duration::from_secs(config.server.request_timeout_seconds),
    );

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7. 通知中继退出并等待当前批次结束
    let _ = shutdown_tx.send(true);
    if let Err(e) = relay_handle.await {
        error!(error = %e, "Dispatch relay task failed");
    }

    // 8. 中继停止后再关闭连接池
    if let Some(db) = repos.database {
        db.close().await;
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 监听关闭信号
///
/// 同时监听 Ctrl+C 和 SIGTERM，容器编排下两者都可能出现
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
