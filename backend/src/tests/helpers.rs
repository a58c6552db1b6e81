use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use std::sync::Arc;
use tower::ServiceExt;

use crate::AppState;
use crate::config::{EngineConfig, RoleRoster};
use crate::handlers::app_router;
use crate::notifications::LoggingGateway;
use crate::roles::StaticRoleDirectory;
use crate::workflows::{ManualClock, WorkflowEngine};

// Common test utilities and shared test setup

pub const TEST_ROSTER: &str =
    "finance=ana,li;front_office_manager=marta;front_desk=sam,kai;sales=olu";

pub fn engine_with_clock(clock: ManualClock) -> Arc<WorkflowEngine> {
    engine_with_config(EngineConfig::default(), clock)
}

pub fn engine_with_config(config: EngineConfig, clock: ManualClock) -> Arc<WorkflowEngine> {
    let roster = RoleRoster::parse(TEST_ROSTER).unwrap_or_default();
    Arc::new(WorkflowEngine::new(
        config,
        Arc::new(LoggingGateway),
        Arc::new(StaticRoleDirectory::new(&roster)),
        Arc::new(clock),
    ))
}

pub fn test_app(engine: Arc<WorkflowEngine>) -> Router {
    app_router(Arc::new(AppState::new(engine)))
}

/// Send a request through the router and decode the JSON response body
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("valid request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
