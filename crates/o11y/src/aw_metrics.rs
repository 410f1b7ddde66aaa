use axum::{Router, routing::get};
use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::{net::SocketAddr, time::Duration};
use tokio::net::TcpListener;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub enable: bool,
    /// Dedicated `/metrics` listener. `None` when the scrape route is
    /// merged into the API router instead.
    pub http_listener: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable: true,
            http_listener: None,
        }
    }
}

pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !cfg.enable {
        return Ok(());
    }

    if HANDLE.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;
        HANDLE.set(handle).ok();
    }

    if let Some(addr) = cfg.http_listener {
        tokio::spawn(async move {
            let mut tries = 0;
            loop {
                match TcpListener::bind(addr).await {
                    Ok(l) => {
                        axum::serve(l, router_with_metrics()).await.ok();
                        break;
                    }
                    Err(e) if tries < 5 => {
                        tries += 1;
                        tracing::warn!(error=%e, tries, "metrics listener bind failed; retrying");
                        tokio::time::sleep(Duration::from_millis(150)).await;
                    }
                    Err(e) => {
                        tracing::error!(error=%e, "metrics listener failed; giving up");
                        break;
                    }
                }
            }
        });
    }

    describe_metrics();

    Ok(())
}

/// Axum handler that renders the current metrics snapshot.
pub async fn metrics_handler() -> String {
    HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# recorder not installed\n".into())
}

pub fn router_with_metrics() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub fn describe_metrics() {
    describe_counter!(
        "apiwatch_cycles_total",
        Unit::Count,
        "Monitoring cycles completed or cancelled"
    );
    describe_counter!(
        "apiwatch_probes_total",
        Unit::Count,
        "Endpoint probes by outcome"
    );
    describe_histogram!(
        "apiwatch_probe_latency_seconds",
        Unit::Seconds,
        "Round trip latency of a single endpoint probe"
    );
    describe_counter!(
        "apiwatch_schema_changes_total",
        Unit::Count,
        "Fingerprint changes detected per endpoint"
    );
    describe_gauge!(
        "apiwatch_endpoints_available",
        Unit::Count,
        "Endpoints that answered 2xx in the latest cycle"
    );
    describe_counter!(
        "apiwatch_persist_failures_total",
        Unit::Count,
        "Failed writes of the schema registry document"
    );
    describe_counter!(
        "apiwatch_panics_total",
        Unit::Count,
        "Panics captured by the process hook"
    );
}
