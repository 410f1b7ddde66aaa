use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, error};
use walkdir::WalkDir;

mod endpoint;
mod errors;
mod monitoring_cfg;

pub use endpoint::{
    EndpointDefinition, endpoint_id, parse_endpoint_ref,
};
pub use errors::{ConfigError, ConfigResult};
pub use monitoring_cfg::{ApiConfig, MonitoringConfig, StoreConfig};

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduler knobs
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Registry persistence
    #[serde(default)]
    pub store: StoreConfig,

    /// Upstream API
    #[serde(default)]
    pub api: ApiConfig,

    /// Endpoints to watch, probed in this order
    #[serde(default)]
    pub endpoints: Vec<EndpointDefinition>,
}

impl AppConfig {
    /// Check the invariants the monitor relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        let m = &self.monitoring;
        if m.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.interval_secs must be at least 1".into(),
            ));
        }
        if m.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.request_timeout_secs must be at least 1".into(),
            ));
        }
        if m.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.history_limit must be at least 1".into(),
            ));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is required".into()));
        }

        let mut seen = HashSet::new();
        for def in &self.endpoints {
            if def.path.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "endpoint path must not be empty".into(),
                ));
            }
            let id = def.endpoint_id();
            if !seen.insert(id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint {id}"
                )));
            }
        }
        Ok(())
    }
}

/// One file of a split configuration directory. Every section is optional;
/// endpoint lists are concatenated.
#[derive(Debug, Default, Deserialize)]
struct ConfigFragment {
    monitoring: Option<MonitoringConfig>,
    store: Option<StoreConfig>,
    api: Option<ApiConfig>,
    #[serde(default)]
    endpoints: Vec<EndpointDefinition>,
}

fn read_expanded(file_path: &str) -> ConfigResult<String> {
    let raw = fs::read_to_string(file_path).map_err(|source| ConfigError::Io {
        path: file_path.to_string(),
        source,
    })?;
    let expanded = shellexpand::env(&raw).map_err(|e| {
        ConfigError::EnvExpansion {
            path: file_path.to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(expanded.into_owned())
}

fn parse_fragment(file_path: &str) -> ConfigResult<ConfigFragment> {
    let with_env = read_expanded(file_path)?;
    serde_yaml::from_str(&with_env).map_err(|source| ConfigError::Parse {
        path: file_path.to_string(),
        source,
    })
}

/// Load and validate a single YAML config file (`${VAR}` expanded).
pub fn load_from_path(file_path: &str) -> ConfigResult<AppConfig> {
    let with_env = read_expanded(file_path)?;
    let cfg: AppConfig =
        serde_yaml::from_str(&with_env).map_err(|source| ConfigError::Parse {
            path: file_path.to_string(),
            source,
        })?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load every `*.yaml` / `*.yml` file of a directory (sorted by path) and
/// merge them. A section may appear in at most one file.
pub fn load_from_dir(dir_path: &str) -> ConfigResult<AppConfig> {
    let mut files: Vec<String> = Vec::new();
    for entry in WalkDir::new(dir_path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let is_yaml = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !is_yaml {
            continue;
        }
        match entry.path().to_str() {
            Some(path_str) => files.push(path_str.to_string()),
            None => {
                error!(file=%entry.path().display(), "skipping file in config dir")
            }
        }
    }
    files.sort();

    let mut cfg = AppConfig::default();
    let (mut monitoring, mut store, mut api) = (false, false, false);

    for file in files {
        let fragment = parse_fragment(&file)?;
        debug!(file = %file, endpoints = fragment.endpoints.len(), "config fragment loaded");

        if let Some(m) = fragment.monitoring {
            take_section(&mut monitoring, "monitoring", &file)?;
            cfg.monitoring = m;
        }
        if let Some(s) = fragment.store {
            take_section(&mut store, "store", &file)?;
            cfg.store = s;
        }
        if let Some(a) = fragment.api {
            take_section(&mut api, "api", &file)?;
            cfg.api = a;
        }
        cfg.endpoints.extend(fragment.endpoints);
    }

    cfg.validate()?;
    Ok(cfg)
}

fn take_section(
    seen: &mut bool,
    section: &'static str,
    file: &str,
) -> ConfigResult<()> {
    if *seen {
        return Err(ConfigError::DuplicateSection {
            section,
            path: file.to_string(),
        });
    }
    *seen = true;
    Ok(())
}

/// Load configuration from a file or a directory of fragments.
pub fn load_cfg(path: &str) -> ConfigResult<AppConfig> {
    match Path::new(path).is_dir() {
        true => load_from_dir(path),
        false => load_from_path(path),
    }
}
