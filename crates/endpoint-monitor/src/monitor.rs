//! Periodic, sequential, paced probing of the configured endpoints.

use std::sync::Arc;
use std::time::Duration;

use apiwatch_config::{
    EndpointDefinition, MonitoringConfig, endpoint_id, parse_endpoint_ref,
};
use chrono::Utc;
use metrics::{counter, gauge, histogram};
use parking_lot::RwLock;
use schema_registry::{ChangeOutcome, ProbeStatus, SchemaRegistry};
use schema_sensing::infer;
use tokio::select;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cycle::{MonitoringCycleResult, ProbeKind, ProbeResult};
use crate::errors::{FetchError, FetchResult};
use crate::fetch::{FetchRequest, FetchResponse, Fetcher};
use crate::report::MonitoringReport;

/// Raw exchange plus its classification, shared by scheduled probes and
/// on-demand exploration.
pub(crate) struct Exchange {
    pub result: ProbeResult,
    pub response: Option<FetchResponse>,
}

pub struct EndpointMonitor {
    registry: Arc<SchemaRegistry>,
    fetcher: Arc<dyn Fetcher>,
    endpoints: Vec<EndpointDefinition>,
    settings: MonitoringConfig,
    cancel: CancellationToken,
    cycle_gate: Mutex<()>,
    last_cycle: RwLock<Option<Arc<MonitoringCycleResult>>>,
}

impl EndpointMonitor {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        fetcher: Arc<dyn Fetcher>,
        endpoints: Vec<EndpointDefinition>,
        settings: MonitoringConfig,
    ) -> Self {
        Self {
            registry,
            fetcher,
            endpoints,
            settings,
            cancel: CancellationToken::new(),
            cycle_gate: Mutex::new(()),
            last_cycle: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn endpoints(&self) -> &[EndpointDefinition] {
        &self.endpoints
    }

    pub fn settings(&self) -> &MonitoringConfig {
        &self.settings
    }

    /// Token that stops the scheduler loop and interrupts waits.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Definition for an endpoint id or bare path, if configured.
    pub fn definition(&self, endpoint: &str) -> Option<&EndpointDefinition> {
        let id = parse_endpoint_ref(endpoint);
        self.endpoints.iter().find(|d| d.endpoint_id() == id)
    }

    pub fn last_cycle(&self) -> Option<Arc<MonitoringCycleResult>> {
        self.last_cycle.read().clone()
    }

    /// Aggregate of registry state, with latency from the latest cycle.
    pub fn report(&self) -> MonitoringReport {
        MonitoringReport::build(
            &self.endpoints,
            &self.registry.list(),
            self.last_cycle().as_deref(),
        )
    }

    /// Scheduler loop: a cycle right away, then one every interval until
    /// cancelled. Persists once more before returning.
    pub async fn run(self: Arc<Self>) {
        info!(
            interval_secs = self.settings.interval_secs,
            endpoints = self.endpoints.len(),
            "periodic monitoring started"
        );

        while !self.cancel.is_cancelled() {
            self.run_cycle().await;

            select! {
                _ = self.cancel.cancelled() => {
                    debug!("cancelled while waiting for next cycle");
                }
                _ = sleep(self.settings.interval()) => {}
            }
        }

        if let Err(e) = self.registry.persist().await {
            counter!("apiwatch_persist_failures_total").increment(1);
            warn!(error = %e, "final schema persist failed");
        }
        info!("periodic monitoring stopped");
    }

    /// Probe every configured endpoint once, in order, with pacing.
    ///
    /// Concurrent callers are serialized. One endpoint's failure never
    /// aborts the cycle.
    pub async fn run_cycle(&self) -> Arc<MonitoringCycleResult> {
        let _g = self.cycle_gate.lock().await;
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(self.endpoints.len());
        let mut cancelled = false;

        info!(endpoints = self.endpoints.len(), "monitoring cycle started");

        for (idx, def) in self.endpoints.iter().enumerate() {
            if idx > 0 && !self.pace().await {
                cancelled = true;
                break;
            }
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let exchange = self.exchange(&FetchRequest::from(def)).await;
            log_probe(&exchange.result);
            results.push(exchange.result);
        }

        let cycle = Arc::new(MonitoringCycleResult {
            started_at,
            finished_at: Utc::now(),
            cancelled,
            results,
        });

        counter!("apiwatch_cycles_total").increment(1);
        gauge!("apiwatch_endpoints_available")
            .set(cycle.results.iter().filter(|r| r.is_available()).count() as f64);

        if let Err(e) = self.registry.persist().await {
            counter!("apiwatch_persist_failures_total").increment(1);
            warn!(error = %e, "schema persist failed after cycle");
        }

        info!(
            probed = cycle.results.len(),
            changed = cycle.changed().count(),
            cancelled,
            "monitoring cycle finished"
        );

        *self.last_cycle.write() = Some(cycle.clone());
        cycle
    }

    /// Wait out the inter-request delay. `false` if cancelled meanwhile.
    async fn pace(&self) -> bool {
        select! {
            _ = self.cancel.cancelled() => {
                debug!("cancelled while pacing");
                false
            }
            _ = sleep(self.settings.pacing()) => true,
        }
    }

    /// Fetch with a bounded timeout, classify, and fold into the registry.
    pub(crate) async fn exchange(&self, request: &FetchRequest) -> Exchange {
        let endpoint_id = endpoint_id(&request.method, &request.path);

        let started = Instant::now();
        let fetched = self.fetch_with_timeout(request).await;
        let latency = started.elapsed();
        let checked_at = Utc::now();

        histogram!("apiwatch_probe_latency_seconds", "endpoint" => endpoint_id.clone())
            .record(latency.as_secs_f64());

        let mut result = ProbeResult {
            endpoint_id: endpoint_id.clone(),
            outcome: ProbeKind::Success,
            http_status: None,
            latency_ms: latency_ms(latency),
            schema_changed: false,
            new_fingerprint: None,
            change: None,
            error: None,
            checked_at,
        };

        let response = match fetched {
            Ok(resp) if resp.is_success() => {
                let outcome = self
                    .registry
                    .record(&endpoint_id, infer(&resp.body), resp.status, checked_at)
                    .await;

                result.http_status = Some(resp.status);
                result.schema_changed = outcome.is_changed();
                if !matches!(outcome, ChangeOutcome::Unchanged { .. }) {
                    result.new_fingerprint = Some(outcome.fingerprint().to_string());
                }
                if outcome.is_changed() {
                    counter!("apiwatch_schema_changes_total", "endpoint" => endpoint_id.clone())
                        .increment(1);
                }
                result.change = Some(outcome);
                Some(resp)
            }
            Ok(resp) => {
                let message = format!("HTTP {}", resp.status);
                self.registry
                    .record_failure(
                        &endpoint_id,
                        ProbeStatus::Http(resp.status),
                        Some(message.clone()),
                        checked_at,
                    )
                    .await;

                result.outcome = ProbeKind::HttpError;
                result.http_status = Some(resp.status);
                result.error = Some(message);
                Some(resp)
            }
            Err(err) => {
                let (kind, status) = ProbeKind::from_fetch_error(&err);
                self.registry
                    .record_failure(&endpoint_id, status, Some(err.to_string()), checked_at)
                    .await;

                result.outcome = kind;
                result.error = Some(err.to_string());
                None
            }
        };

        counter!("apiwatch_probes_total", "outcome" => result.outcome.as_str())
            .increment(1);

        Exchange { result, response }
    }

    async fn fetch_with_timeout(
        &self,
        request: &FetchRequest,
    ) -> FetchResult<FetchResponse> {
        match timeout(self.settings.request_timeout(), self.fetcher.fetch(request))
            .await
        {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout),
        }
    }
}

fn latency_ms(d: Duration) -> f64 {
    crate::report::round2(d.as_secs_f64() * 1000.0)
}

fn log_probe(result: &ProbeResult) {
    match result.outcome {
        ProbeKind::Success if result.schema_changed => info!(
            endpoint = %result.endpoint_id,
            status = ?result.http_status,
            latency_ms = result.latency_ms,
            fingerprint = ?result.new_fingerprint,
            "probe ok, schema changed"
        ),
        ProbeKind::Success => debug!(
            endpoint = %result.endpoint_id,
            status = ?result.http_status,
            latency_ms = result.latency_ms,
            "probe ok"
        ),
        kind => warn!(
            endpoint = %result.endpoint_id,
            outcome = kind.as_str(),
            status = ?result.http_status,
            error = ?result.error,
            "probe failed"
        ),
    }
}
