use axum::{
    Router,
    extract::State,
    http::Method,
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod idempotency;
pub mod workflows;

pub use idempotency::{IdempotencyLedger, StepOperation, TransitionKey};
pub use workflows::workflow_routes;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_workflows: usize,
    pub historical_workflows: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.engine.store();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_workflows: store.active_count().await,
        historical_workflows: store.history_count().await,
    })
}

/// Full HTTP surface of the service
pub fn app_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Reservation Workflow Engine API v1" }))
        .route("/health", get(health_check))
        .nest("/api/v1/workflows", workflow_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}
