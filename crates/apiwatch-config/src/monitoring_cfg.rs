//! Monitoring, store and upstream API configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler configuration.
///
/// Consumed as opaque settings by the monitor; validated on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Master switch for the periodic scheduler. On-demand probes keep
    /// working when disabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between two monitoring cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Minimum delay between two probes within a cycle (ms).
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of history entries kept per endpoint.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            pacing_ms: default_pacing_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            history_limit: default_history_limit(),
        }
    }
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where the schema registry is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Single JSON document on disk, replaced atomically on every persist.
    File {
        #[serde(default = "default_store_path")]
        path: String,
    },
    /// Nothing survives a restart.
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_store_path(),
        }
    }
}

/// Upstream API the endpoints are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base url prepended to every endpoint path.
    #[serde(default)]
    pub base_url: String,

    /// Static headers sent with every request (session cookies, tokens).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_pacing_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_history_limit() -> usize {
    10
}

fn default_store_path() -> String {
    "./data/schemas/schemas.json".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MonitoringConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.interval(), Duration::from_secs(86_400));
        assert_eq!(cfg.pacing(), Duration::from_millis(500));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.history_limit, 10);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: MonitoringConfig =
            serde_yaml::from_str("interval_secs: 60").unwrap();
        assert_eq!(cfg.interval_secs, 60);
        assert_eq!(cfg.pacing_ms, 500);
        assert!(cfg.enabled);
    }

    #[test]
    fn store_kind_is_tagged() {
        let store: StoreConfig = serde_yaml::from_str("kind: memory").unwrap();
        assert_eq!(store, StoreConfig::Memory);

        let store: StoreConfig = serde_yaml::from_str("kind: file").unwrap();
        assert_eq!(store, StoreConfig::default());
    }
}
