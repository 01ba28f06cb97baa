use axum::{Router, response::IntoResponse, routing::get};
use histoflow_server::config::Config;
use histoflow_server::server::{AppState, build_router, connect_storage};
use histoflow_server::tiling::build_trigger;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Process start time for the uptime gauge
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    START_TIME.set(Instant::now()).ok();

    // Must be installed before any metric is recorded
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "histoflow=debug,histoflow_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}, uploads_bucket={}, tiles_bucket={}",
        config.host, config.port, config.storage.uploads_bucket, config.storage.tiles_bucket
    );

    // A misconfigured tiling trigger is fatal at startup
    let trigger = build_trigger(&config.tiling)?;
    match &trigger {
        Some(_) => info!("Tiling trigger: {} -> {}", config.tiling.strategy, config.tiling.base_url),
        None => warn!("Tiling trigger disabled; completed uploads will not be tiled"),
    }

    let store = connect_storage(&config).await;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::new(config, store, trigger);

    // Periodic uptime gauge
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
            metrics::gauge!("histoflow_uptime_seconds").set(uptime as f64);
        }
    });

    let app = build_router(state)
        .merge(Router::new().route("/metrics/prometheus", get(prometheus_metrics)));

    info!("HistoFlow server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
