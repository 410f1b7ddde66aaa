//! Per-probe and per-cycle results.

use chrono::{DateTime, Utc};
use schema_registry::{ChangeOutcome, ProbeStatus};
use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// Classified outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Success,
    HttpError,
    NetworkError,
    Timeout,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Success => "success",
            ProbeKind::HttpError => "http_error",
            ProbeKind::NetworkError => "network_error",
            ProbeKind::Timeout => "timeout",
        }
    }

    /// Kind matching a registry status.
    pub fn from_status(status: &ProbeStatus) -> ProbeKind {
        match status {
            ProbeStatus::Http(_) if status.is_success() => ProbeKind::Success,
            ProbeStatus::Http(_) => ProbeKind::HttpError,
            ProbeStatus::Timeout => ProbeKind::Timeout,
            ProbeStatus::NetworkError | ProbeStatus::DecodeError => {
                ProbeKind::NetworkError
            }
        }
    }

    /// Kind and registry status for a failed exchange.
    pub(crate) fn from_fetch_error(err: &FetchError) -> (ProbeKind, ProbeStatus) {
        match err {
            FetchError::Timeout => (ProbeKind::Timeout, ProbeStatus::Timeout),
            FetchError::Connection(_) => {
                (ProbeKind::NetworkError, ProbeStatus::NetworkError)
            }
            FetchError::Decode(_) => {
                (ProbeKind::NetworkError, ProbeStatus::DecodeError)
            }
        }
    }
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub endpoint_id: String,
    pub outcome: ProbeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub latency_ms: f64,
    pub schema_changed: bool,
    /// Set when the probe produced a fingerprint the registry did not have.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn is_available(&self) -> bool {
        self.outcome == ProbeKind::Success
    }
}

/// Results of one monitoring cycle, in probe order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringCycleResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Shutdown interrupted the cycle before every endpoint was probed.
    pub cancelled: bool,
    pub results: Vec<ProbeResult>,
}

impl MonitoringCycleResult {
    pub fn get(&self, endpoint_id: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.endpoint_id == endpoint_id)
    }

    pub fn changed(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.schema_changed)
    }
}
