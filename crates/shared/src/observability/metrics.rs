//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册预定义的业务指标描述（出现在 /metrics 的 HELP 注释中）
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "reward_claims_total",
        "Total number of reward RPC calls by outcome"
    );
    metrics::describe_histogram!(
        "reward_claim_duration_seconds",
        "Reward RPC duration in seconds"
    );

    metrics::describe_counter!(
        "reward_dispatches_total",
        "Total number of ledger record dispatches by outcome"
    );
    metrics::describe_histogram!(
        "reward_dispatch_duration_seconds",
        "Ledger record dispatch duration in seconds"
    );

    metrics::describe_counter!(
        "reward_points_applied_total",
        "Total points credited to user aggregates"
    );
    metrics::describe_gauge!(
        "reward_relay_backlog",
        "Undispatched ledger records seen by the last relay poll"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录一次奖励 RPC 调用
#[inline]
pub fn record_claim(rpc: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "reward_claims_total",
        "rpc" => rpc.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "reward_claim_duration_seconds",
        "rpc" => rpc.to_string()
    )
    .record(duration_secs);
}

/// 记录一次账本记录派发
#[inline]
pub fn record_dispatch(action: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "reward_dispatches_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "reward_dispatch_duration_seconds",
        "action" => action.to_string()
    )
    .record(duration_secs);
}

/// 记录入账积分
#[inline]
pub fn record_points_applied(action: &str, points: i64) {
    if points <= 0 {
        return;
    }
    metrics::counter!(
        "reward_points_applied_total",
        "action" => action.to_string()
    )
    .increment(points as u64);
}

/// 更新中继积压量
#[inline]
pub fn set_relay_backlog(backlog: usize) {
    metrics::gauge!("reward_relay_backlog").set(backlog as f64);
}
