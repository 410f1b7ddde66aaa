//! Query operations exposed to clients (REST, LLM tools).
//!
//! Every operation returns plain data: unknown endpoints and unreachable
//! hosts are reported in the result, never as errors.

use std::collections::BTreeMap;

use apiwatch_config::{EndpointDefinition, endpoint_id, parse_endpoint_ref};
use chrono::{DateTime, Utc};
use schema_registry::{ChangeOutcome, EndpointSchema};
use schema_sensing::{
    FieldPath, JsonSchema, describe, field_paths, infer, summarize_value,
    to_json_schema,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cycle::ProbeKind;
use crate::errors::MonitorResult;
use crate::fetch::FetchRequest;
use crate::monitor::EndpointMonitor;
use crate::report::MonitoringReport;

const PREVIEW_DEPTH: usize = 2;

/// `get_endpoint_schema` result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SchemaLookup {
    Found(Box<SchemaDetails>),
    NotFound {
        endpoint: String,
        message: String,
        known_endpoints: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaDetails {
    #[serde(flatten)]
    pub record: EndpointSchema,
    pub available: bool,
    pub field_count: usize,
    pub fields: Vec<FieldPath>,
    pub description: String,
    pub json_schema: JsonSchema,
}

/// `list_available_endpoints` result.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointListing {
    pub total_endpoints: usize,
    pub available_count: usize,
    pub endpoints: Vec<EndpointStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStatus {
    pub endpoint_id: String,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Configured for periodic probing (as opposed to only explored).
    pub monitored: bool,
    /// `None` until the endpoint has been observed once.
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub field_count: usize,
}

/// `get_schema_changes` result.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaChanges {
    pub total_changes_tracked: usize,
    pub changes: Vec<SchemaChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaChange {
    pub endpoint_id: String,
    pub current_fingerprint: String,
    pub previous_fingerprint: Option<String>,
    pub sequence: u64,
    pub current_field_count: usize,
    pub changed_at: Option<DateTime<Utc>>,
}

/// `explore_endpoint` result.
#[derive(Debug, Clone, Serialize)]
pub struct ExploreResult {
    pub endpoint_id: String,
    pub success: bool,
    pub outcome: ProbeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeOutcome>,
    pub discovered_fields: Vec<FieldPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_preview: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EndpointMonitor {
    /// Latest report; with `refresh` a full cycle runs first.
    pub async fn check_api_status(&self, refresh: bool) -> MonitoringReport {
        if refresh {
            self.run_cycle().await;
        }
        self.report()
    }

    /// Registry record for an endpoint id (`GET /v3/profiles`) or bare path.
    pub fn get_endpoint_schema(&self, endpoint: &str) -> SchemaLookup {
        let id = parse_endpoint_ref(endpoint);
        match self.registry().get(&id) {
            Some(record) => {
                let fields = field_paths(&record.current);
                SchemaLookup::Found(Box::new(SchemaDetails {
                    available: record.is_available(),
                    field_count: record.current.field_count(),
                    description: describe(&record.current),
                    json_schema: to_json_schema(&record.current),
                    fields,
                    record: (*record).clone(),
                }))
            }
            None => SchemaLookup::NotFound {
                message: format!("No schema information available for {id}"),
                endpoint: id,
                known_endpoints: self
                    .registry()
                    .list()
                    .iter()
                    .map(|r| r.endpoint_id.clone())
                    .collect(),
            },
        }
    }

    /// Configured endpoints joined with registry status, followed by
    /// endpoints only known from exploration.
    pub fn list_available_endpoints(&self) -> EndpointListing {
        let mut endpoints: Vec<EndpointStatus> = self
            .endpoints()
            .iter()
            .map(|def| self.status_for(def))
            .collect();

        for record in self.registry().list() {
            if endpoints.iter().any(|e| e.endpoint_id == record.endpoint_id) {
                continue;
            }
            endpoints.push(EndpointStatus {
                endpoint_id: record.endpoint_id.clone(),
                method: record.method.clone(),
                path: record.path.clone(),
                description: String::new(),
                params: BTreeMap::new(),
                monitored: false,
                available: Some(record.is_available()),
                last_checked_at: Some(record.last_checked_at),
                fingerprint: Some(record.fingerprint.clone()),
                field_count: record.current.field_count(),
            });
        }

        EndpointListing {
            total_endpoints: endpoints.len(),
            available_count: endpoints
                .iter()
                .filter(|e| e.available == Some(true))
                .count(),
            endpoints,
        }
    }

    fn status_for(&self, def: &EndpointDefinition) -> EndpointStatus {
        let id = def.endpoint_id();
        let record = self.registry().get(&id);
        EndpointStatus {
            method: def.method.to_ascii_uppercase(),
            path: def.path.clone(),
            description: def.description.clone(),
            params: def.params.clone(),
            monitored: true,
            available: record.as_ref().map(|r| r.is_available()),
            last_checked_at: record.as_ref().map(|r| r.last_checked_at),
            fingerprint: record.as_ref().map(|r| r.fingerprint.clone()),
            field_count: record
                .as_ref()
                .map(|r| r.current.field_count())
                .unwrap_or(0),
            endpoint_id: id,
        }
    }

    /// Endpoints whose retained history holds more than one fingerprint.
    pub fn get_schema_changes(&self) -> SchemaChanges {
        let changes: Vec<SchemaChange> = self
            .registry()
            .list()
            .iter()
            .filter(|r| r.distinct_fingerprints() > 1)
            .map(|r| SchemaChange {
                endpoint_id: r.endpoint_id.clone(),
                current_fingerprint: r.fingerprint.clone(),
                previous_fingerprint: r.previous_fingerprint().map(str::to_string),
                sequence: r.sequence,
                current_field_count: r.current.field_count(),
                changed_at: r.last_changed_at,
            })
            .collect();

        SchemaChanges {
            total_changes_tracked: changes.len(),
            changes,
        }
    }

    /// Probe any path right now and describe what came back.
    ///
    /// Goes through the same classification and registry update as a
    /// scheduled probe, without waiting for a running cycle. Without
    /// explicit params a configured endpoint is probed with its own.
    pub async fn explore_endpoint(
        &self,
        path: &str,
        method: Option<&str>,
        params: BTreeMap<String, String>,
    ) -> ExploreResult {
        let method = method.unwrap_or("GET").to_ascii_uppercase();
        let id = endpoint_id(&method, path);
        let params = match self.definition(&id) {
            Some(def) if params.is_empty() => def.params.clone(),
            _ => params,
        };
        let request = FetchRequest {
            method,
            path: path.to_string(),
            params,
        };
        info!(endpoint = %id, "exploring endpoint");

        let exchange = self.exchange(&request).await;
        let result = exchange.result;
        let success = result.is_available();

        let (discovered_fields, schema_description, data_preview) =
            match exchange.response.filter(|_| success) {
                Some(resp) => {
                    let schema = infer(&resp.body);
                    (
                        field_paths(&schema),
                        Some(describe(&schema)),
                        Some(summarize_value(&resp.body, PREVIEW_DEPTH)),
                    )
                }
                None => (Vec::new(), None, None),
            };

        ExploreResult {
            endpoint_id: result.endpoint_id,
            success,
            outcome: result.outcome,
            http_status: result.http_status,
            latency_ms: result.latency_ms,
            change: result.change,
            discovered_fields,
            schema_description,
            data_preview,
            error: result.error,
        }
    }

    /// Forget one endpoint's schema and persist. `false` if it was unknown.
    pub async fn clear_schema(&self, endpoint: &str) -> MonitorResult<bool> {
        let cleared = self.registry().clear(endpoint).await;
        if cleared {
            self.registry().persist().await?;
        }
        Ok(cleared)
    }

    /// Forget every schema and persist.
    pub async fn clear_all_schemas(&self) -> MonitorResult<usize> {
        let cleared = self.registry().clear_all().await;
        self.registry().persist().await?;
        Ok(cleared)
    }
}
