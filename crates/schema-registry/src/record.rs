use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schema_sensing::FieldSchema;
use serde::{Deserialize, Serialize};

/// Outcome of the latest probe of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The server answered with this HTTP status.
    Http(u16),
    NetworkError,
    Timeout,
    DecodeError,
}

impl ProbeStatus {
    /// 2xx answer.
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeStatus::Http(code) if (200..300).contains(code))
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProbeStatus::Http(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Http(code) => write!(f, "http {code}"),
            ProbeStatus::NetworkError => f.write_str("network_error"),
            ProbeStatus::Timeout => f.write_str("timeout"),
            ProbeStatus::DecodeError => f.write_str("decode_error"),
        }
    }
}

/// One successful observation of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub fingerprint: String,
    pub observed_at: DateTime<Utc>,
    pub http_status: u16,
}

/// Registry state for a single endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSchema {
    /// `METHOD /path`
    pub endpoint_id: String,
    pub method: String,
    pub path: String,

    /// Unified schema over every successful observation.
    pub current: FieldSchema,

    /// Fingerprint of `current`.
    pub fingerprint: String,

    /// Starts at 1, increments on each detected change.
    pub sequence: u64,

    /// Most recent last, capped by the registry's history limit.
    pub history: Vec<HistoryEntry>,

    pub first_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed_at: Option<DateTime<Utc>>,
    pub last_checked_at: DateTime<Utc>,
    pub last_status: ProbeStatus,

    /// Error message of the latest failed probe, cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl EndpointSchema {
    /// Whether the latest probe succeeded.
    pub fn is_available(&self) -> bool {
        self.last_status.is_success()
    }

    /// Most recent fingerprint in history that differs from the current one.
    pub fn previous_fingerprint(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .map(|h| h.fingerprint.as_str())
            .find(|fp| *fp != self.fingerprint)
    }

    /// Number of distinct fingerprints retained in history.
    pub fn distinct_fingerprints(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for entry in &self.history {
            if !seen.contains(&entry.fingerprint.as_str()) {
                seen.push(&entry.fingerprint);
            }
        }
        seen.len()
    }
}

/// Result of folding a successful observation into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeOutcome {
    /// Endpoint had no record; the inferred schema was adopted as-is.
    FirstObservation { fingerprint: String, sequence: u64 },

    /// Schema unchanged
    Unchanged { fingerprint: String, sequence: u64 },

    /// Unified schema differs from the stored one.
    Changed {
        previous: String,
        fingerprint: String,
        sequence: u64,
    },
}

impl ChangeOutcome {
    /// Fingerprint after the observation was recorded.
    pub fn fingerprint(&self) -> &str {
        match self {
            ChangeOutcome::FirstObservation { fingerprint, .. }
            | ChangeOutcome::Unchanged { fingerprint, .. }
            | ChangeOutcome::Changed { fingerprint, .. } => fingerprint,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeOutcome::Changed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOutcome::FirstObservation { .. } => "first_observation",
            ChangeOutcome::Unchanged { .. } => "unchanged",
            ChangeOutcome::Changed { .. } => "changed",
        }
    }
}

pub(crate) const DOCUMENT_VERSION: u32 = 1;

/// On-disk layout of the registry.
#[derive(Debug, Serialize)]
pub(crate) struct RegistryDocument<'a> {
    pub version: u32,
    pub endpoints: BTreeMap<&'a str, &'a EndpointSchema>,
}

/// Loose form used on load so one bad record does not poison the rest.
#[derive(Debug, Deserialize)]
pub(crate) struct RawRegistryDocument {
    pub version: u32,
    #[serde(default)]
    pub endpoints: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn probe_status_serializes_tagged() {
        assert_eq!(
            serde_json::to_value(ProbeStatus::Http(404)).unwrap(),
            json!({"kind": "http", "code": 404})
        );
        assert_eq!(
            serde_json::to_value(ProbeStatus::Timeout).unwrap(),
            json!({"kind": "timeout"})
        );
        assert!(ProbeStatus::Http(204).is_success());
        assert!(!ProbeStatus::Http(500).is_success());
        assert!(!ProbeStatus::NetworkError.is_success());
    }

    #[test]
    fn change_outcome_accessors() {
        let outcome = ChangeOutcome::Changed {
            previous: "a".into(),
            fingerprint: "b".into(),
            sequence: 2,
        };
        assert_eq!(outcome.fingerprint(), "b");
        assert!(outcome.is_changed());
        assert_eq!(outcome.as_str(), "changed");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"kind": "changed", "previous": "a", "fingerprint": "b", "sequence": 2})
        );
    }
}
