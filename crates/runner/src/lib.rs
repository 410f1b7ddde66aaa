//! Wiring shared by the `apiwatch` binary and its tests.

use std::sync::Arc;

use anyhow::{Context, Result};
use apiwatch_config::{AppConfig, StoreConfig};
use endpoint_monitor::{EndpointMonitor, Fetcher, HttpFetcher};
use schema_registry::SchemaRegistry;
use schema_store::{FileSchemaStore, MemSchemaStore, SchemaStore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub fn build_store(cfg: &StoreConfig) -> Result<Arc<dyn SchemaStore>> {
    let store: Arc<dyn SchemaStore> = match cfg {
        StoreConfig::File { path } => Arc::new(
            FileSchemaStore::new(path)
                .with_context(|| format!("open schema store at {path}"))?,
        ),
        StoreConfig::Memory => Arc::new(MemSchemaStore::default()),
    };
    Ok(store)
}

/// Registry loaded from the configured store. A cold or unreadable store
/// starts empty.
pub async fn build_registry(cfg: &AppConfig) -> Result<Arc<SchemaRegistry>> {
    let store = build_store(&cfg.store)?;
    let registry = Arc::new(SchemaRegistry::new(
        store.clone(),
        cfg.monitoring.history_limit,
    ));

    match registry.load().await {
        Ok(n) => info!(store = %store.describe(), endpoints = n, "schema registry loaded"),
        Err(e) => warn!(store = %store.describe(), error = %e, "schema registry load failed; starting empty"),
    }
    Ok(registry)
}

/// Monitor over `fetcher`, with the registry taken from config.
pub async fn build_monitor_with(
    cfg: &AppConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Arc<EndpointMonitor>> {
    let registry = build_registry(cfg).await?;
    Ok(Arc::new(EndpointMonitor::new(
        registry,
        fetcher,
        cfg.endpoints.clone(),
        cfg.monitoring.clone(),
    )))
}

pub async fn build_monitor(cfg: &AppConfig) -> Result<Arc<EndpointMonitor>> {
    let fetcher = HttpFetcher::new(&cfg.api, cfg.monitoring.request_timeout())
        .context("build http client")?;
    build_monitor_with(cfg, Arc::new(fetcher)).await
}

/// Start the scheduler unless disabled in config.
pub fn spawn_scheduler(
    cfg: &AppConfig,
    monitor: &Arc<EndpointMonitor>,
) -> Option<JoinHandle<()>> {
    if !cfg.monitoring.enabled {
        info!("periodic monitoring disabled; serving on-demand probes only");
        return None;
    }
    Some(tokio::spawn(monitor.clone().run()))
}

/// Cancel the scheduler, wait for it, and make sure the registry is on disk.
pub async fn shutdown(
    monitor: &EndpointMonitor,
    scheduler: Option<JoinHandle<()>>,
) -> Result<()> {
    monitor.shutdown();
    match scheduler {
        // the loop persists on its way out
        Some(handle) => handle.await.context("join monitoring scheduler")?,
        None => monitor
            .registry()
            .persist()
            .await
            .context("persist schema registry")?,
    }
    info!("monitor stopped");
    Ok(())
}
