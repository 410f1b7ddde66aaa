use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::monitor::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct ReadyStatus {
    status: &'static str,
    monitored_endpoints: usize,
    known_schemas: usize,
}

async fn readyz(State(st): State<AppState>) -> Json<ReadyStatus> {
    let listing = st.controller.list_endpoints().await;
    Json(ReadyStatus {
        status: "ready",
        monitored_endpoints: listing.endpoints.iter().filter(|e| e.monitored).count(),
        known_schemas: listing
            .endpoints
            .iter()
            .filter(|e| e.fingerprint.is_some())
            .count(),
    })
}
