use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use concierge_shared::{
    Priority, ReservationSnapshot, WorkflowFilter, WorkflowInstance, WorkflowStats,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::idempotency::{StepOperation, TransitionKey};
use crate::AppState;
use crate::error::{ApiResult, AppError, ValidationBuilder};
use crate::workflows::{CreateOutcome, classify};

const DEFAULT_ACTOR: &str = "api";

pub fn workflow_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_workflow).get(list_workflows))
        .route("/stats", get(workflow_stats))
        .route("/history", get(list_history))
        .route("/:id", get(get_workflow))
        .route("/:id/assignees", get(get_assignees))
        .route("/:id/cancel", post(cancel_workflow))
        .route("/:id/steps/:step_id/start", post(start_step))
        .route("/:id/steps/:step_id/approve", post(approve_step))
        .route("/:id/steps/:step_id/reject", post(reject_step))
        .route("/:id/steps/:step_id/complete", post(complete_step))
        .route("/:id/steps/:step_id/skip", post(skip_step))
        .route("/:id/steps/:step_id/reset-escalation", post(reset_escalation))
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub reservation: ReservationSnapshot,
    /// Template name; derived from the reservation when absent
    pub workflow_type: Option<String>,
    pub priority: Option<Priority>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateWorkflowResponse {
    pub created: bool,
    pub workflow: WorkflowInstance,
}

#[derive(Debug, Default, Deserialize)]
pub struct StepActionRequest {
    pub actor: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteStepRequest {
    pub actor: Option<String>,
    #[serde(default = "empty_payload")]
    pub payload: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelWorkflowRequest {
    pub actor: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssigneesResponse {
    pub workflow_id: Uuid,
    pub role: Option<String>,
    pub staff: Vec<String>,
}

fn empty_payload() -> serde_json::Value {
    serde_json::json!({})
}

fn actor(actor: &Option<String>) -> &str {
    actor
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
}

fn validate_reservation(reservation: &ReservationSnapshot) -> ApiResult<()> {
    let mut errors = ValidationBuilder::new();
    if reservation.reservation_id.trim().is_empty() {
        errors = errors.error("reservation_id", "is required");
    }
    if reservation.booking_number.trim().is_empty() {
        errors = errors.error("booking_number", "is required");
    }
    if reservation.total_amount < Decimal::ZERO {
        errors = errors.error("total_amount", "must not be negative");
    }
    match errors.build() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWorkflowRequest>,
) -> ApiResult<(StatusCode, Json<CreateWorkflowResponse>)> {
    validate_reservation(&req.reservation)?;
    let created_by = actor(&req.created_by).to_string();

    let outcome = match (&req.workflow_type, req.priority) {
        (None, None) => state.engine.create_workflow(req.reservation, &created_by).await,
        (workflow_type, priority) => {
            let derived = classify(&req.reservation, state.engine.config());
            let workflow_type = workflow_type
                .clone()
                .unwrap_or_else(|| derived.workflow_type.to_string());
            let priority = priority.unwrap_or(derived.priority);
            state
                .engine
                .create_workflow_with(req.reservation, &workflow_type, priority, &created_by)
                .await?
        }
    };

    let status = match outcome {
        CreateOutcome::Created(_) => StatusCode::CREATED,
        CreateOutcome::Existing(_) => StatusCode::OK,
    };
    Ok((
        status,
        Json(CreateWorkflowResponse {
            created: outcome.is_created(),
            workflow: outcome.into_instance(),
        }),
    ))
}

async fn list_workflows(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<WorkflowFilter>,
) -> Json<Vec<WorkflowInstance>> {
    Json(state.engine.list_active_workflows(&filter).await)
}

async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<WorkflowFilter>,
) -> Json<Vec<WorkflowInstance>> {
    Json(state.engine.list_history(&filter).await)
}

async fn workflow_stats(State(state): State<Arc<AppState>>) -> Json<WorkflowStats> {
    Json(state.engine.get_workflow_stats().await)
}

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowInstance>> {
    Ok(Json(state.engine.get_workflow(id).await?))
}

async fn get_assignees(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AssigneesResponse>> {
    let instance = state.engine.get_workflow(id).await?;
    let staff = state.engine.assignees(id).await?;
    Ok(Json(AssigneesResponse {
        workflow_id: id,
        role: instance.current_role().map(str::to_string),
        staff,
    }))
}

async fn cancel_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelWorkflowRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let instance = state
        .engine
        .cancel_workflow(id, actor(&req.actor), req.reason)
        .await?;
    Ok(Json(instance))
}

async fn start_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<StepActionRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let key = TransitionKey::new(id, step_id, StepOperation::Start);
    let instance = state
        .ledger
        .apply_once(key, || state.engine.start_step(id, step_id, actor(&req.actor)))
        .await?;
    Ok(Json(instance))
}

async fn approve_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<StepActionRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let key = TransitionKey::new(id, step_id, StepOperation::Approve);
    let instance = state
        .ledger
        .apply_once(key, || {
            state
                .engine
                .approve_step(id, step_id, actor(&req.actor), req.notes.clone())
        })
        .await?;
    Ok(Json(instance))
}

async fn reject_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<StepActionRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let key = TransitionKey::new(id, step_id, StepOperation::Reject);
    let instance = state
        .ledger
        .apply_once(key, || {
            state
                .engine
                .reject_step(id, step_id, actor(&req.actor), req.notes.clone())
        })
        .await?;
    Ok(Json(instance))
}

async fn complete_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<CompleteStepRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_else(|| CompleteStepRequest {
        actor: None,
        payload: empty_payload(),
    });
    if !req.payload.is_object() {
        return Err(AppError::BadRequest("payload must be a JSON object".to_string()));
    }

    let key = TransitionKey::new(id, step_id, StepOperation::Complete);
    let instance = state
        .ledger
        .apply_once(key, || {
            state
                .engine
                .complete_manual_step(id, step_id, actor(&req.actor), req.payload.clone())
        })
        .await?;
    Ok(Json(instance))
}

async fn skip_step(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<StepActionRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let key = TransitionKey::new(id, step_id, StepOperation::Skip);
    let instance = state
        .ledger
        .apply_once(key, || {
            state
                .engine
                .skip_step(id, step_id, actor(&req.actor), req.notes.clone())
        })
        .await?;
    Ok(Json(instance))
}

async fn reset_escalation(
    State(state): State<Arc<AppState>>,
    Path((id, step_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<StepActionRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let instance = state
        .engine
        .reset_escalation(id, step_id, actor(&req.actor))
        .await?;
    Ok(Json(instance))
}
