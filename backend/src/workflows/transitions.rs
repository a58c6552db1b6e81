// Step Transitions - Legal state changes of a workflow's steps
//
// Every operation here works on a single, already locked instance. Callers hand
// in a working copy and commit it only when the operation returns Ok, so a
// rejected operation never leaves a partial change behind.

use chrono::{DateTime, Utc};
use concierge_shared::{
    NotificationRequest, NotificationType, Recipient, StepStatus, StepType, WorkflowInstance,
    WorkflowStatus, WorkflowStep,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{StepExecutor, StepStateViolation, WorkflowError, WorkflowResult};

pub const SYSTEM_ACTOR: &str = "system";

/// Outcome of moving a step into `in_progress`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    /// Waiting on an external actor
    Suspended,
    /// Ran automatically and completed
    Completed,
    /// Ran automatically and failed
    Failed,
}

#[derive(Debug, Clone)]
pub struct StepTransitionEngine {
    executor: StepExecutor,
}

impl StepTransitionEngine {
    pub fn new(executor: StepExecutor) -> Self {
        Self { executor }
    }

    /// Kick off a freshly built instance. An automatic first step runs right
    /// away and the chain continues until a step needs a human; a manual or
    /// approval first step stays pending until explicitly started.
    pub fn begin(&self, instance: &mut WorkflowInstance, now: DateTime<Utc>) -> Vec<NotificationRequest> {
        let now = effective_now(instance, now);
        let before = instance.status;
        let mut out = Vec::new();

        let starts_automatically = instance.steps.first().map(runs_automatically).unwrap_or(true);
        if starts_automatically {
            self.advance(instance, now, &mut out);
        }

        self.settle(instance, before, now, &mut out);
        out
    }

    /// Explicitly start the next pending step
    pub fn start_step(
        &self,
        instance: &mut WorkflowInstance,
        step_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<NotificationRequest>> {
        ensure_open(instance)?;
        let idx = step_index(instance, step_id)?;

        let step = &instance.steps[idx];
        if step.status != StepStatus::Pending {
            return Err(WorkflowError::invalid_step(
                instance.id,
                step_id,
                StepStateViolation::WrongStatus { actual: step.status },
            ));
        }
        let predecessors_done = instance.steps[..idx].iter().all(|s| s.status.is_done());
        if instance.current_step_index().is_some() || !predecessors_done {
            return Err(WorkflowError::invalid_step(
                instance.id,
                step_id,
                StepStateViolation::NotStartable,
            ));
        }

        let now = effective_now(instance, now);
        let before = instance.status;
        let mut out = Vec::new();

        debug!("Step {} of workflow {} started by {}", step_id, instance.id, actor);
        if self.activate(instance, idx, now, &mut out) == Activation::Completed {
            self.advance(instance, now, &mut out);
        }

        self.settle(instance, before, now, &mut out);
        Ok(out)
    }

    pub fn approve(
        &self,
        instance: &mut WorkflowInstance,
        step_id: Uuid,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<NotificationRequest>> {
        let idx = actionable(instance, step_id, Some(StepType::Approval))?;
        let now = effective_now(instance, now);
        let before = instance.status;
        let mut out = Vec::new();

        finish_step(&mut instance.steps[idx], StepStatus::Completed, actor, notes, now);
        instance.updated_at = now;
        info!("Step {} of workflow {} approved by {}", step_id, instance.id, actor);

        self.advance(instance, now, &mut out);
        self.settle(instance, before, now, &mut out);
        Ok(out)
    }

    /// Rejection of an approval gate is final: the whole workflow fails
    pub fn reject(
        &self,
        instance: &mut WorkflowInstance,
        step_id: Uuid,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<NotificationRequest>> {
        let idx = actionable(instance, step_id, Some(StepType::Approval))?;
        let now = effective_now(instance, now);
        let before = instance.status;
        let mut out = Vec::new();

        finish_step(&mut instance.steps[idx], StepStatus::Failed, actor, notes, now);
        instance.updated_at = now;
        info!("Step {} of workflow {} rejected by {}", step_id, instance.id, actor);

        self.settle(instance, before, now, &mut out);
        Ok(out)
    }

    pub fn complete_manual(
        &self,
        instance: &mut WorkflowInstance,
        step_id: Uuid,
        actor: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<NotificationRequest>> {
        let idx = actionable(instance, step_id, Some(StepType::Manual))?;

        let missing = missing_fields(&instance.steps[idx], &payload);
        if !missing.is_empty() {
            return Err(WorkflowError::invalid_step(
                instance.id,
                step_id,
                StepStateViolation::MissingFields(missing),
            ));
        }

        let now = effective_now(instance, now);
        let before = instance.status;
        let mut out = Vec::new();

        let notes = payload.get("notes").and_then(|n| n.as_str()).map(str::to_string);
        let step = &mut instance.steps[idx];
        finish_step(step, StepStatus::Completed, actor, notes, now);
        step.payload = Some(payload);
        instance.updated_at = now;
        info!("Manual step {} of workflow {} completed by {}", step_id, instance.id, actor);

        self.advance(instance, now, &mut out);
        self.settle(instance, before, now, &mut out);
        Ok(out)
    }

    pub fn skip(
        &self,
        instance: &mut WorkflowInstance,
        step_id: Uuid,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Vec<NotificationRequest>> {
        let idx = actionable(instance, step_id, None)?;
        let step = &instance.steps[idx];
        if !step.skippable || step.step_type == StepType::Approval {
            return Err(WorkflowError::invalid_step(
                instance.id,
                step_id,
                StepStateViolation::NotSkippable,
            ));
        }

        let now = effective_now(instance, now);
        let before = instance.status;
        let mut out = Vec::new();

        finish_step(&mut instance.steps[idx], StepStatus::Skipped, actor, notes, now);
        instance.updated_at = now;
        info!("Step {} of workflow {} skipped by {}", step_id, instance.id, actor);

        self.advance(instance, now, &mut out);
        self.settle(instance, before, now, &mut out);
        Ok(out)
    }

    /// Cancel regardless of step state. Returns `None` when the instance was
    /// already terminal, which makes cancellation idempotent.
    pub fn cancel(
        &self,
        instance: &mut WorkflowInstance,
        actor: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Vec<NotificationRequest>> {
        if instance.is_terminal() {
            return None;
        }

        let now = effective_now(instance, now);
        let mut out = Vec::new();

        instance.status = WorkflowStatus::Cancelled;
        instance.cancellation_reason = reason.clone();
        instance.updated_at = now;

        let recipient = match instance.current_role() {
            Some(role) => Recipient::Role(role.to_string()),
            None => Recipient::Staff(instance.created_by.clone()),
        };
        let message = format!(
            "Workflow for booking {} cancelled by {}{}",
            instance.metadata.booking_number,
            actor,
            reason.map(|r| format!(": {}", r)).unwrap_or_default()
        );
        let step_id = instance.current_step().map(|s| s.id);
        emit(instance, &mut out, step_id, now, NotificationType::WorkflowCancelled, recipient, message);

        info!("Workflow {} cancelled by {}", instance.id, actor);
        Some(out)
    }

    /// Re-arm the once-per-step timeout warning and escalation
    pub fn reset_escalation(
        &self,
        instance: &mut WorkflowInstance,
        step_id: Uuid,
        actor: &str,
        now: DateTime<Utc>,
    ) -> WorkflowResult<()> {
        let idx = actionable(instance, step_id, None)?;
        let now = effective_now(instance, now);

        let step = &mut instance.steps[idx];
        step.escalated_at = None;
        step.warned_at = None;
        instance.updated_at = now;

        info!("Escalation of step {} in workflow {} reset by {}", step_id, instance.id, actor);
        Ok(())
    }

    /// Start the next pending step, running automatic steps back to back until
    /// one needs external input, fails, or none remain.
    fn advance(&self, instance: &mut WorkflowInstance, now: DateTime<Utc>, out: &mut Vec<NotificationRequest>) {
        while let Some(idx) = instance.steps.iter().position(|s| s.status == StepStatus::Pending) {
            if self.activate(instance, idx, now, out) != Activation::Completed {
                return;
            }
        }
    }

    fn activate(
        &self,
        instance: &mut WorkflowInstance,
        idx: usize,
        now: DateTime<Utc>,
        out: &mut Vec<NotificationRequest>,
    ) -> Activation {
        let step = &mut instance.steps[idx];
        step.status = StepStatus::InProgress;
        step.started_at = Some(now);
        instance.updated_at = now;

        let step = &instance.steps[idx];
        let step_id = step.id;

        if !runs_automatically(step) {
            if let Some(role) = step.assigned_to_role.clone() {
                let message = format!(
                    "'{}' for booking {} is waiting on {}",
                    step.name, instance.metadata.booking_number, role
                );
                emit(instance, out, Some(step_id), now, NotificationType::StepAssigned, Recipient::Role(role), message);
            }
            debug!("Workflow {} suspended at step {}", instance.id, step_id);
            return Activation::Suspended;
        }

        let Some(action) = step.action else {
            finish_step(
                &mut instance.steps[idx],
                StepStatus::Completed,
                SYSTEM_ACTOR,
                Some("completed automatically".to_string()),
                now,
            );
            return Activation::Completed;
        };

        let result = self.executor.execute(action, &instance.metadata);
        let status = if result.success {
            StepStatus::Completed
        } else {
            StepStatus::Failed
        };

        let step = &mut instance.steps[idx];
        finish_step(step, status, SYSTEM_ACTOR, Some(result.summary(action)), now);
        step.payload = result.output.clone();

        for pending in result.notifications {
            emit(
                instance,
                out,
                Some(step_id),
                now,
                pending.notification_type,
                pending.recipient,
                pending.message,
            );
        }

        if result.success {
            Activation::Completed
        } else {
            Activation::Failed
        }
    }

    /// Re-derive the instance status and announce terminal outcomes
    fn settle(
        &self,
        instance: &mut WorkflowInstance,
        before: WorkflowStatus,
        now: DateTime<Utc>,
        out: &mut Vec<NotificationRequest>,
    ) {
        let after = instance.derived_status();
        instance.status = after;
        debug_assert!(instance.in_progress_count() <= 1);

        if before == after {
            return;
        }

        let creator = Recipient::Staff(instance.created_by.clone());
        let booking = instance.metadata.booking_number.clone();
        match after {
            WorkflowStatus::Completed => {
                info!("Workflow {} completed", instance.id);
                let message = format!("Workflow for booking {} completed", booking);
                emit(instance, out, None, now, NotificationType::WorkflowCompleted, creator, message);
            }
            WorkflowStatus::Failed => {
                let failed = instance.steps.iter().find(|s| s.status == StepStatus::Failed);
                let step_id = failed.map(|s| s.id);
                let reason = failed
                    .map(|s| {
                        format!(
                            "{}: {}",
                            s.name,
                            s.notes.as_deref().unwrap_or("no reason given")
                        )
                    })
                    .unwrap_or_default();
                info!("Workflow {} failed ({})", instance.id, reason);
                let message = format!("Workflow for booking {} failed at {}", booking, reason);
                emit(instance, out, step_id, now, NotificationType::WorkflowFailed, creator, message);
            }
            WorkflowStatus::Active | WorkflowStatus::Cancelled => {}
        }
    }
}

/// Automatic steps and auto-executing manual steps run without waiting.
/// Approval steps always wait for a human.
fn runs_automatically(step: &WorkflowStep) -> bool {
    step.step_type != StepType::Approval && (step.auto_execute || step.step_type == StepType::Automatic)
}

/// Timestamps never move backwards within an instance
fn effective_now(instance: &WorkflowInstance, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(instance.updated_at)
}

fn ensure_open(instance: &WorkflowInstance) -> WorkflowResult<()> {
    if instance.is_terminal() {
        return Err(WorkflowError::WorkflowTerminated {
            workflow_id: instance.id,
            status: instance.status,
        });
    }
    Ok(())
}

fn step_index(instance: &WorkflowInstance, step_id: Uuid) -> WorkflowResult<usize> {
    instance
        .steps
        .iter()
        .position(|s| s.id == step_id)
        .ok_or_else(|| WorkflowError::step_not_found(step_id))
}

/// Index of the step if it is the current in-progress step of an open
/// workflow and, when given, of the expected type.
fn actionable(
    instance: &WorkflowInstance,
    step_id: Uuid,
    expected: Option<StepType>,
) -> WorkflowResult<usize> {
    ensure_open(instance)?;
    let idx = step_index(instance, step_id)?;
    let step = &instance.steps[idx];

    if step.status != StepStatus::InProgress {
        return Err(WorkflowError::invalid_step(
            instance.id,
            step_id,
            StepStateViolation::WrongStatus { actual: step.status },
        ));
    }
    if let Some(expected) = expected {
        if step.step_type != expected {
            return Err(WorkflowError::invalid_step(
                instance.id,
                step_id,
                StepStateViolation::WrongStepType {
                    expected,
                    actual: step.step_type,
                },
            ));
        }
    }
    Ok(idx)
}

fn finish_step(
    step: &mut WorkflowStep,
    status: StepStatus,
    actor: &str,
    notes: Option<String>,
    now: DateTime<Utc>,
) {
    step.status = status;
    step.completed_at = Some(now);
    step.completed_by = Some(actor.to_string());
    if notes.is_some() {
        step.notes = notes;
    }
}

/// Required fields that are absent, null or blank in the payload
fn missing_fields(step: &WorkflowStep, payload: &serde_json::Value) -> Vec<String> {
    step.required_fields
        .iter()
        .filter(|field| match payload.get(field.as_str()) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .cloned()
        .collect()
}

fn emit(
    instance: &mut WorkflowInstance,
    out: &mut Vec<NotificationRequest>,
    step_id: Option<Uuid>,
    now: DateTime<Utc>,
    notification_type: NotificationType,
    recipient: Recipient,
    message: String,
) {
    let request = NotificationRequest::new(notification_type, recipient, message, instance.id, step_id, now);
    instance.notifications.push(request.clone());
    out.push(request);
}
