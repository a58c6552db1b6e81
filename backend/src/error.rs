//! HTTP error mapping for the workflow API
//!
//! Every endpoint reports failures with the same JSON body. Engine errors map
//! onto status codes here so handlers can propagate them with `?`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::workflows::{StepStateViolation, WorkflowError};

pub type FieldErrors = HashMap<String, Vec<String>>;

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable machine-readable code, e.g. "INVALID_STEP_STATE"
    pub code: String,
    pub message: String,
    /// Per-field problems for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
    /// RFC 3339
    pub timestamp: String,
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        let details = match err {
            AppError::ValidationError { details } => Some(details.clone()),
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            message: err.public_message(),
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidStepState(String),
    #[error("{0}")]
    WorkflowTerminated(String),

    #[error("Validation failed")]
    ValidationError { details: FieldErrors },
    #[error("{0}")]
    BadRequest(String),
    #[error("Unknown workflow template '{0}'")]
    UnknownTemplate(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidStepState(_) | Self::WorkflowTerminated(_) => StatusCode::CONFLICT,
            Self::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) | Self::UnknownTemplate(_) => StatusCode::BAD_REQUEST,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidStepState(_) => "INVALID_STEP_STATE",
            Self::WorkflowTerminated(_) => "WORKFLOW_TERMINATED",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::UnknownTemplate(_) => "UNKNOWN_TEMPLATE",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to clients; internal details only go to the log
    fn public_message(&self) -> String {
        match self {
            Self::InternalError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::InternalError(msg) = &self {
            tracing::error!("Internal error: {}", msg);
        }
        (self.status_code(), Json(ApiError::from(&self))).into_response()
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::UnknownTemplate(name) => Self::UnknownTemplate(name),
            WorkflowError::NotFound { resource, id } => Self::NotFound(format!("{} {}", resource, id)),
            WorkflowError::InvalidStepState {
                reason: StepStateViolation::MissingFields(fields),
                ..
            } => fields
                .iter()
                .fold(ValidationBuilder::new(), |b, field| b.error(field, "is required"))
                .build()
                .unwrap_or_else(|| Self::BadRequest("Missing required fields".to_string())),
            err @ WorkflowError::InvalidStepState { .. } => Self::InvalidStepState(err.to_string()),
            err @ WorkflowError::WorkflowTerminated { .. } => Self::WorkflowTerminated(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, AppError>;

/// Collects field errors and turns them into a single 422
#[derive(Debug, Default)]
pub struct ValidationBuilder {
    details: FieldErrors,
}

impl ValidationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(mut self, field: &str, message: &str) -> Self {
        self.details
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
        self
    }

    pub fn build(self) -> Option<AppError> {
        (!self.details.is_empty()).then_some(AppError::ValidationError {
            details: self.details,
        })
    }
}
