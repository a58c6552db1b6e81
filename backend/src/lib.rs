//! Reservation workflow engine
//!
//! Drives reservations through classification-specific step sequences with
//! role-assigned manual work, approval gates and advisory timeouts. The
//! binary hosts the engine behind an HTTP API with a background job scheduler.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod notifications;
pub mod roles;
pub mod workflows;

pub use error::{ApiError, ApiResult, AppError};

#[cfg(test)]
mod tests;

pub struct AppState {
    pub engine: Arc<workflows::WorkflowEngine>,
    pub ledger: handlers::IdempotencyLedger,
}

impl AppState {
    pub fn new(engine: Arc<workflows::WorkflowEngine>) -> Self {
        Self {
            engine,
            ledger: handlers::IdempotencyLedger::default(),
        }
    }
}
