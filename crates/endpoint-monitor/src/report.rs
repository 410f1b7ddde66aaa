//! Point-in-time aggregation of registry state.
//!
//! Registry records are the source of truth for each endpoint's last status,
//! so the report reflects on-demand probes and state loaded at startup. The
//! latest cycle only contributes what the registry does not keep: latency and
//! whether that probe changed the schema.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use apiwatch_config::EndpointDefinition;
use chrono::{DateTime, Utc};
use schema_registry::EndpointSchema;
use serde::{Deserialize, Serialize};

use crate::cycle::{MonitoringCycleResult, ProbeKind, ProbeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every known endpoint answered 2xx on its latest check.
    Ok,
    /// At least one endpoint failed its latest check.
    Degraded,
    /// Nothing has been checked yet.
    NoData,
}

/// Latest known state of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointReport {
    pub endpoint_id: String,
    pub outcome: ProbeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Only known when the latest check belongs to the latest cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub schema_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_fingerprint: Option<String>,
    /// Current registry fingerprint, absent until a first 2xx.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl EndpointReport {
    pub fn is_available(&self) -> bool {
        self.outcome == ProbeKind::Success
    }

    fn from_record(record: &EndpointSchema) -> Self {
        Self {
            endpoint_id: record.endpoint_id.clone(),
            outcome: ProbeKind::from_status(&record.last_status),
            http_status: record.last_status.http_status(),
            latency_ms: None,
            schema_changed: false,
            new_fingerprint: None,
            fingerprint: Some(record.fingerprint.clone()),
            error: record.last_error.clone(),
            checked_at: record.last_checked_at,
        }
    }

    fn from_probe(probe: &ProbeResult, fingerprint: Option<String>) -> Self {
        Self {
            endpoint_id: probe.endpoint_id.clone(),
            outcome: probe.outcome,
            http_status: probe.http_status,
            latency_ms: Some(probe.latency_ms),
            schema_changed: probe.schema_changed,
            new_fingerprint: probe.new_fingerprint.clone(),
            fingerprint,
            error: probe.error.clone(),
            checked_at: probe.checked_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_endpoints: usize,
    pub available: usize,
    pub unavailable: usize,
    pub schema_changes: usize,
    /// Mean latency over available endpoints with a known latency, rounded
    /// to 2 decimals.
    pub average_latency_ms: f64,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReportSummary>,
    #[serde(default)]
    pub endpoints: Vec<EndpointReport>,
}

impl MonitoringReport {
    pub fn no_data() -> Self {
        Self {
            status: ReportStatus::NoData,
            message: Some(
                "No monitoring data available. Run a check first.".to_string(),
            ),
            summary: None,
            endpoints: Vec::new(),
        }
    }

    /// Aggregate registry records, configured endpoints first, then those
    /// only known from exploration.
    ///
    /// A cycle probe is used for an endpoint when it is that endpoint's
    /// latest check, or when the registry has no record of it (failures
    /// before any 2xx). Endpoints never checked are left out.
    pub fn build(
        definitions: &[EndpointDefinition],
        records: &[Arc<EndpointSchema>],
        cycle: Option<&MonitoringCycleResult>,
    ) -> Self {
        let by_id: BTreeMap<&str, &EndpointSchema> = records
            .iter()
            .map(|r| (r.endpoint_id.as_str(), r.as_ref()))
            .collect();

        let mut order: Vec<String> =
            definitions.iter().map(|d| d.endpoint_id()).collect();
        let configured: HashSet<String> = order.iter().cloned().collect();
        order.extend(
            records
                .iter()
                .filter(|r| !configured.contains(&r.endpoint_id))
                .map(|r| r.endpoint_id.clone()),
        );

        let endpoints: Vec<EndpointReport> = order
            .iter()
            .filter_map(|id| {
                let record = by_id.get(id.as_str()).copied();
                let probe = cycle.and_then(|c| c.get(id));
                match (record, probe) {
                    (Some(r), Some(p)) if is_latest(p, r) => {
                        Some(EndpointReport::from_probe(p, Some(r.fingerprint.clone())))
                    }
                    (Some(r), _) => Some(EndpointReport::from_record(r)),
                    (None, Some(p)) => Some(EndpointReport::from_probe(p, None)),
                    (None, None) => None,
                }
            })
            .collect();

        let Some(last_check) = endpoints.iter().map(|e| e.checked_at).max() else {
            return Self::no_data();
        };

        let available: Vec<&EndpointReport> =
            endpoints.iter().filter(|e| e.is_available()).collect();
        let unavailable = endpoints.len() - available.len();

        let latencies: Vec<f64> =
            available.iter().filter_map(|e| e.latency_ms).collect();
        let average_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            round2(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        Self {
            status: if unavailable == 0 {
                ReportStatus::Ok
            } else {
                ReportStatus::Degraded
            },
            message: cycle
                .filter(|c| c.cancelled)
                .map(|_| "Latest cycle was interrupted before every endpoint was probed.".to_string()),
            summary: Some(ReportSummary {
                total_endpoints: endpoints.len(),
                available: available.len(),
                unavailable,
                schema_changes: endpoints.iter().filter(|e| e.schema_changed).count(),
                average_latency_ms,
                last_check,
            }),
            endpoints,
        }
    }
}

/// The probe is the check the record last saw.
fn is_latest(probe: &ProbeResult, record: &EndpointSchema) -> bool {
    probe.checked_at == record.last_checked_at
        && probe.outcome == ProbeKind::from_status(&record.last_status)
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
