use axum::Router;
mod errors;
mod health;
mod monitor;

pub use errors::{ApiError, api_error};
pub use monitor::{
    AppState, ClearResult, ExploreRequest, MonitorController, StatusQuery,
};

/// Build the router with health and monitoring routes.
pub fn router(state: AppState) -> Router {
    let health_state = state.clone();
    let health = health::router(health_state);
    let monitoring = monitor::router(state);

    health.merge(monitoring)
}
