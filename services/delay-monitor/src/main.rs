//! TDX live train delay monitor
//!
//! Single-binary service that:
//! 1. Obtains a TDX access token with the client-credentials grant
//! 2. Polls the Taiwan Railway live delay feed on a fixed interval
//! 3. Shows the latest result as a bar chart page, or logs it when no
//!    chart listener is configured

mod chart;
mod config;
mod error;
mod metrics;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use delay_poller::{PollingFetcher, spawn_poll_task};
use delay_sink::{LogSink, Sink, SinkError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tdx_auth::CredentialManager;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::chart::{ChartSink, Snapshot, render_page};
use crate::config::Config;
use crate::error::Error;

/// How long shutdown waits for the poller and the chart listener
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for the chart listener's handlers
#[derive(Clone)]
struct AppState {
    snapshots: watch::Receiver<Option<Snapshot>>,
    credentials: CredentialManager,
    prometheus: PrometheusHandle,
    refresh_secs: u64,
    started_at: Instant,
}

/// Build the axum router for the chart listener.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(chart_handler))
        .route("/api/delays", get(delays_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting delay-monitor");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        client_id = %config.tdx.client_id,
        api_url = %config.tdx.api_url,
        interval_secs = config.poll.interval_secs,
        timeout_secs = config.poll.timeout_secs,
        chart = config.chart.is_some(),
        "configuration loaded"
    );

    let client = reqwest::Client::new();
    let credentials = CredentialManager::new(client.clone(), config.client_config()?);
    let fetcher = Arc::new(PollingFetcher::new(
        client,
        credentials.clone(),
        config.fetcher_config(),
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let (server_shutdown_tx, server_shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let (sink, server_handle): (Arc<dyn Sink>, Option<tokio::task::JoinHandle<_>>) =
        match &config.chart {
            Some(chart) => {
                let (sink, snapshots) = ChartSink::new();
                let app_state = AppState {
                    snapshots,
                    credentials: credentials.clone(),
                    prometheus: prometheus_handle,
                    refresh_secs: config.poll.interval_secs,
                    started_at: Instant::now(),
                };
                let app = build_router(app_state, chart.max_connections);

                let listener = TcpListener::bind(chart.listen_addr)
                    .await
                    .map_err(|source| Error::Bind {
                        addr: chart.listen_addr,
                        source,
                    })?;
                info!(addr = %chart.listen_addr, "chart page listening");

                let handle = tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async {
                            let _ = server_shutdown_rx.await;
                        })
                        .await
                });
                let sink: Arc<dyn Sink> = Arc::new(sink);
                (sink, Some(handle))
            }
            None => {
                info!("no [chart] section, delay tables go to the log");
                let sink: Arc<dyn Sink> = Arc::new(LogSink::new());
                (sink, None)
            }
        };

    let mut poll_handle = spawn_poll_task(fetcher, config.interval(), sink, stop_rx);

    // Run until a signal arrives or the poller ends on its own (fatal sink error)
    let early_exit = tokio::select! {
        _ = shutdown_signal() => None,
        exit = &mut poll_handle => Some(exit),
    };

    stop_tx.send_replace(true);
    let _ = server_shutdown_tx.send(());

    let poller_exit = match early_exit {
        Some(exit) => Some(exit),
        None => match tokio::time::timeout(DRAIN_TIMEOUT, poll_handle).await {
            Ok(exit) => Some(exit),
            Err(_) => {
                warn!(
                    drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                    "polling loop did not stop in time"
                );
                None
            }
        },
    };

    let outcome: error::Result<()> = match poller_exit {
        Some(Ok(Ok(()))) | None => Ok(()),
        Some(Ok(Err(SinkError::Fatal(msg)))) => Err(Error::PollerStopped(msg)),
        Some(Err(e)) => Err(Error::PollerStopped(format!("poll task panicked: {e}"))),
    };

    if let Some(handle) = server_handle {
        match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
            Ok(Ok(Ok(()))) => info!("chart listener stopped"),
            Ok(Ok(Err(e))) => error!(error = %e, "chart listener error during shutdown"),
            Ok(Err(e)) => error!(error = %e, "chart listener task panicked"),
            Err(_) => warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "chart listener drain timeout exceeded, forcing shutdown"
            ),
        }
    }

    info!("shutdown complete");
    outcome.map_err(Into::into)
}

/// Chart page: latest snapshot as an HTML bar chart.
async fn chart_handler(State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_page_view("/");
    let snapshot = state.snapshots.borrow().clone();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        render_page(snapshot.as_ref(), state.refresh_secs),
    )
}

/// Latest snapshot as JSON: 200 with records, 502 with the cycle's error,
/// 503 before the first cycle has finished.
async fn delays_handler(State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_page_view("/api/delays");
    let snapshot = state.snapshots.borrow().clone();

    let (status_code, body) = match snapshot {
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({ "status": "pending" }),
        ),
        Some(Snapshot {
            cycle,
            received_at,
            result: Ok(records),
        }) => (
            StatusCode::OK,
            serde_json::json!({
                "cycle": cycle,
                "age_secs": received_at.elapsed().as_secs(),
                "records": records,
            }),
        ),
        Some(Snapshot {
            cycle,
            received_at,
            result: Err(e),
        }) => (
            StatusCode::BAD_GATEWAY,
            serde_json::json!({
                "cycle": cycle,
                "age_secs": received_at.elapsed().as_secs(),
                "error": {
                    "kind": e.kind(),
                    "message": e.to_string(),
                },
            }),
        ),
    };

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Health endpoint: 200 while starting or when the last cycle succeeded,
/// 503 when the last cycle failed.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_page_view("/health");
    let uptime = state.started_at.elapsed().as_secs();
    let token_expires_in = state.credentials.expires_in().await;
    let snapshot = state.snapshots.borrow().clone();

    let (status_code, status, cycles, last_outcome) = match &snapshot {
        None => (StatusCode::OK, "starting", 0, None),
        Some(s) => match &s.result {
            Ok(_) => (StatusCode::OK, "healthy", s.cycle, Some("success")),
            Err(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "degraded",
                s.cycle,
                Some(e.kind()),
            ),
        },
    };

    let body = serde_json::json!({
        "status": status,
        "uptime_seconds": uptime,
        "cycles": cycles,
        "last_outcome": last_outcome,
        "token_valid": token_expires_in.is_some(),
        "token_expires_in_secs": token_expires_in.map(|d| d.as_secs()),
    });

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_page_view("/metrics");
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
