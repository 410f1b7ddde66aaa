//! Monitoring status, schema lookup and exploration routes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use endpoint_monitor::{
    EndpointListing, EndpointMonitor, ExploreResult, MonitoringReport,
    SchemaChanges, SchemaLookup,
};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, api_error};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<dyn MonitorController>,
}

/// Operations the HTTP surface needs from the monitor.
#[async_trait]
pub trait MonitorController: Send + Sync {
    /// Latest report, optionally running a fresh cycle first.
    async fn status(&self, refresh: bool) -> MonitoringReport;

    /// Configured and explored endpoints with their status.
    async fn list_endpoints(&self) -> EndpointListing;

    /// Schema for an endpoint id or bare path.
    async fn schema(&self, endpoint: &str) -> SchemaLookup;

    /// Endpoints with more than one retained fingerprint.
    async fn changes(&self) -> SchemaChanges;

    /// Probe an arbitrary path now.
    async fn explore(&self, req: ExploreRequest) -> Result<ExploreResult, ApiError>;

    /// Forget one endpoint's schema.
    async fn clear(&self, endpoint: &str) -> Result<(), ApiError>;

    /// Forget every schema, returning how many were dropped.
    async fn clear_all(&self) -> Result<usize, ApiError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploreRequest {
    pub path: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResult {
    pub cleared: usize,
}

#[async_trait]
impl MonitorController for EndpointMonitor {
    async fn status(&self, refresh: bool) -> MonitoringReport {
        self.check_api_status(refresh).await
    }

    async fn list_endpoints(&self) -> EndpointListing {
        self.list_available_endpoints()
    }

    async fn schema(&self, endpoint: &str) -> SchemaLookup {
        self.get_endpoint_schema(endpoint)
    }

    async fn changes(&self) -> SchemaChanges {
        self.get_schema_changes()
    }

    async fn explore(&self, req: ExploreRequest) -> Result<ExploreResult, ApiError> {
        if req.path.trim().is_empty() {
            return Err(ApiError::BadRequest("path must not be empty".into()));
        }
        Ok(self
            .explore_endpoint(&req.path, req.method.as_deref(), req.params)
            .await)
    }

    async fn clear(&self, endpoint: &str) -> Result<(), ApiError> {
        match self.clear_schema(endpoint).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ApiError::NotFound(format!("schema for {endpoint}"))),
            Err(e) => Err(ApiError::Failed(e.into())),
        }
    }

    async fn clear_all(&self) -> Result<usize, ApiError> {
        self.clear_all_schemas()
            .await
            .map_err(|e| ApiError::Failed(e.into()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/endpoints", get(get_endpoints))
        .route("/schemas", delete(clear_schemas))
        .route("/schemas/{*endpoint}", get(get_schema).delete(clear_schema))
        .route("/changes", get(get_changes))
        .route("/explore", post(explore))
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

async fn get_status(
    State(st): State<AppState>,
    Query(q): Query<StatusQuery>,
) -> Json<MonitoringReport> {
    Json(st.controller.status(q.refresh).await)
}

async fn get_endpoints(State(st): State<AppState>) -> Json<EndpointListing> {
    Json(st.controller.list_endpoints().await)
}

async fn get_schema(
    State(st): State<AppState>,
    Path(endpoint): Path<String>,
) -> (StatusCode, Json<SchemaLookup>) {
    let lookup = st.controller.schema(&endpoint).await;
    let status = match lookup {
        SchemaLookup::Found(_) => StatusCode::OK,
        SchemaLookup::NotFound { .. } => StatusCode::NOT_FOUND,
    };
    (status, Json(lookup))
}

async fn clear_schema(
    State(st): State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    st.controller
        .clear(&endpoint)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}

async fn clear_schemas(State(st): State<AppState>) -> ApiResult<ClearResult> {
    st.controller
        .clear_all()
        .await
        .map(|cleared| Json(ClearResult { cleared }))
        .map_err(api_error)
}

async fn get_changes(State(st): State<AppState>) -> Json<SchemaChanges> {
    Json(st.controller.changes().await)
}

async fn explore(
    State(st): State<AppState>,
    Json(req): Json<ExploreRequest>,
) -> ApiResult<ExploreResult> {
    st.controller.explore(req).await.map(Json).map_err(api_error)
}
