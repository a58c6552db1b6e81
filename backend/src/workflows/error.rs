// Workflow Errors - Failure taxonomy for workflow creation and step transitions

use concierge_shared::{StepStatus, StepType, WorkflowStatus};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Why a step cannot be acted on right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStateViolation {
    /// The step is not the one currently in progress
    WrongStatus { actual: StepStatus },
    /// The operation does not apply to this kind of step
    WrongStepType { expected: StepType, actual: StepType },
    /// A step can only be started once every predecessor is done and nothing else runs
    NotStartable,
    NotSkippable,
    /// Manual-step payload is missing blueprint-required fields
    MissingFields(Vec<String>),
}

impl fmt::Display for StepStateViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongStatus { actual } => {
                write!(f, "step is {} but must be in_progress", actual)
            }
            Self::WrongStepType { expected, actual } => {
                write!(f, "operation requires a {} step, found {}", expected, actual)
            }
            Self::NotStartable => f.write_str("step is not next in line"),
            Self::NotSkippable => f.write_str("step cannot be skipped"),
            Self::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Unknown workflow template '{0}'")]
    UnknownTemplate(String),
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
    #[error("Step {step_id} of workflow {workflow_id} is not actionable: {reason}")]
    InvalidStepState {
        workflow_id: Uuid,
        step_id: Uuid,
        reason: StepStateViolation,
    },
    #[error("Workflow {workflow_id} is already {status}")]
    WorkflowTerminated {
        workflow_id: Uuid,
        status: WorkflowStatus,
    },
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn workflow_not_found(id: Uuid) -> Self {
        Self::NotFound {
            resource: "Workflow",
            id: id.to_string(),
        }
    }

    pub fn step_not_found(id: Uuid) -> Self {
        Self::NotFound {
            resource: "Step",
            id: id.to_string(),
        }
    }

    pub fn invalid_step(workflow_id: Uuid, step_id: Uuid, reason: StepStateViolation) -> Self {
        Self::InvalidStepState {
            workflow_id,
            step_id,
            reason,
        }
    }

    /// Missing manual-step fields, if this is a payload validation failure
    pub fn missing_fields(&self) -> Option<&[String]> {
        match self {
            Self::InvalidStepState {
                reason: StepStateViolation::MissingFields(fields),
                ..
            } => Some(fields),
            _ => None,
        }
    }
}
