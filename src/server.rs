//! Exporter Runtime
//!
//! Wires the monitor client, the poll loop, the SNMP agent and the HTTP
//! endpoints together.
//!
//! # Architecture
//!
//! - **Poll Loop**: background task that fetches status documents every
//!   `poll.interval_seconds`, differences them and updates the MIB
//! - **SNMP Agent**: UDP task answering GET / GETNEXT from the shared MIB
//! - **HTTP Server**: Axum-based server exposing `/metrics`, `/health`, and `/`
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - Health check (returns 200 if the monitor answered the last poll, 503 otherwise)
//!
//! # Error Handling
//!
//! A failed poll is logged, sets `genmon_up` to 0 and delays the next poll by
//! `interval * error_backoff_factor`. Exhausting the reconnect budget or losing
//! the SNMP transport ends [`start`] with an error; the process is expected to
//! exit and be restarted by its supervisor.

use crate::collectors::{self, CollectionContext, CollectionStatus};
use crate::config::Config;
use crate::metrics::MetricsCollector;
use crate::mib::{ControllerKind, MibLayout, SharedMib};
use crate::monitor::MonitorClient;
use crate::sinks::MibSink;
use crate::snmp::{AgentHandle, Responder, SnmpAgent};
use crate::status::StatusTreeDiffer;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    metrics: MetricsCollector,
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    let metrics = MetricsCollector::new()?;
    let client = Arc::new(MonitorClient::new(config.monitor.clone()));

    client.connect().await?;

    let mut agent_handle: Option<AgentHandle> = None;
    let mut agent_task: Option<JoinHandle<crate::error::Result<()>>> = None;
    let mut mib_sink: Option<MibSink> = None;

    if config.snmp.enabled {
        let registry = build_mib(&config, &client).await?;
        metrics.mib_entries.set(registry.read().await.len() as i64);

        let responder = Responder::new(config.snmp.community.clone(), registry.clone())
            .with_metrics(metrics.clone());
        let agent = SnmpAgent::bind(&config.snmp, responder).await?;
        agent_handle = Some(agent.handle());
        agent_task = Some(tokio::spawn(agent.run()));
        mib_sink = Some(MibSink::new(registry));
    }

    let poll_task = tokio::spawn(poll_loop(
        config.clone(),
        client.clone(),
        metrics.clone(),
        mib_sink,
    ));

    let http_task = if config.server.enabled {
        let app = Router::new()
            .route("/", get(root_handler))
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(AppState {
                metrics: metrics.clone(),
            });

        let addr = format!("{}:{}", config.server.addr, config.server.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Metrics server listening on {}", addr);
        info!("Metrics available at http://{}/metrics", addr);

        Some(tokio::spawn(async move { axum::serve(listener, app).await }))
    } else {
        None
    };

    let outcome: anyhow::Result<()> = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
        joined = poll_task => match joined {
            Ok(result) => result,
            Err(e) => Err(anyhow::Error::from(e)),
        },
        joined = wait_optional(agent_task) => match joined {
            Ok(result) => result.map_err(anyhow::Error::from),
            Err(e) => Err(anyhow::Error::from(e)),
        },
        joined = wait_optional(http_task) => match joined {
            Ok(result) => result.map_err(anyhow::Error::from),
            Err(e) => Err(anyhow::Error::from(e)),
        },
    };

    if let Some(handle) = agent_handle {
        handle.stop();
    }
    client.close().await;
    outcome
}

/// Detect the controller and load its MIB tables.
async fn build_mib(config: &Config, client: &MonitorClient) -> anyhow::Result<SharedMib> {
    let start_info = match client.query_start_info().await {
        Ok(info) => {
            info!("Monitor reports controller '{}'", info.controller);
            Some(info)
        }
        Err(e) => {
            warn!("Failed to query start info, using configured controller: {}", e);
            None
        }
    };

    let controller = ControllerKind::detect(start_info.as_ref(), &config.snmp.controller_type)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unsupported controller type '{}'",
                config.snmp.controller_type
            )
        })?;

    let registry = MibLayout::new(&config.snmp).build(&controller)?;
    Ok(registry.into_shared())
}

async fn poll_loop(
    config: Config,
    client: Arc<MonitorClient>,
    metrics: MetricsCollector,
    mib: Option<MibSink>,
) -> anyhow::Result<()> {
    let poll_interval = Duration::from_secs(config.poll.interval_seconds.max(1));
    let backoff = poll_interval * config.poll.error_backoff_factor.max(1);

    let mut differ = StatusTreeDiffer::new(
        config.poll.blacklist.clone(),
        config.poll.flush_interval_seconds.map(Duration::from_secs),
    );
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let ctx = CollectionContext {
            client: &client,
            metrics: &metrics,
            config: &config.poll,
            mib: mib.as_ref(),
        };

        match collectors::collect_status(&ctx, &mut differ).await {
            Ok(CollectionStatus::Success) => metrics.up.set(1),
            Ok(CollectionStatus::Failed) => {
                metrics.up.set(0);
                metrics.poll_errors_total.inc();
                warn!("Poll failed, retrying in {}s", backoff.as_secs());
                sleep(backoff).await;
                ticker.reset();
            }
            Err(e) => {
                error!("Poll loop stopped: {}", e);
                metrics.up.set(0);
                return Err(e);
            }
        }
    }
}

async fn wait_optional<T>(task: Option<JoinHandle<T>>) -> Result<T, tokio::task::JoinError> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}

async fn root_handler() -> impl IntoResponse {
    r#"<html>
<head><title>Genmon Exporter</title></head>
<body>
<h1>Genmon Generator Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.metrics.up.get() > 0 {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Genmon monitor unreachable",
        )
    }
}
