// Timeout Monitor Job - Flags overdue manual and approval steps
//
// Timeouts are advisory. An overdue step is escalated to its role's escalation
// contact once, and a step nearing its timeout gets one warning. Neither changes
// the step's status.

use chrono::{DateTime, Duration, Utc};
use concierge_shared::{
    NotificationRequest, NotificationType, Recipient, StepType, WorkflowInstance,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::JobConfig;
use crate::workflows::WorkflowEngine;

#[derive(Debug)]
pub struct TimeoutMonitorJob {
    engine: Arc<WorkflowEngine>,
    warning_lead: Duration,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TimeoutSweepReport {
    pub workflows_checked: usize,
    pub warnings_sent: usize,
    pub escalations_triggered: usize,
    pub errors: Vec<String>,
}

/// What a single step needs at this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeoutAction {
    Warn { due_in: Duration },
    Escalate { overdue_by: Duration },
}

impl TimeoutMonitorJob {
    pub fn new(engine: Arc<WorkflowEngine>, config: &JobConfig) -> Self {
        Self {
            engine,
            warning_lead: Duration::minutes(i64::from(config.timeout_warning_lead_minutes)),
        }
    }

    pub async fn run(&self) -> TimeoutSweepReport {
        let mut report = TimeoutSweepReport::default();

        for handle in self.engine.store().active_handles().await {
            let emitted = {
                let mut instance = handle.lock().await;
                if instance.is_terminal() {
                    continue;
                }
                report.workflows_checked += 1;
                self.inspect(&mut instance, self.engine.now(), &mut report)
            };

            if emitted.is_empty() {
                continue;
            }
            let summary = self.engine.dispatcher().dispatch(&emitted).await;
            if summary.failed > 0 {
                report.errors.push(format!(
                    "Failed to deliver {} timeout notification(s) for workflow {}",
                    summary.failed, emitted[0].workflow_id
                ));
            }
        }

        if report.warnings_sent > 0 || report.escalations_triggered > 0 {
            info!(
                "Timeout sweep: {} workflows checked, {} warnings, {} escalations",
                report.workflows_checked, report.warnings_sent, report.escalations_triggered
            );
        } else {
            debug!("Timeout sweep: {} workflows checked", report.workflows_checked);
        }

        report
    }

    /// Evaluate the current step of one locked instance
    fn inspect(
        &self,
        instance: &mut WorkflowInstance,
        now: DateTime<Utc>,
        report: &mut TimeoutSweepReport,
    ) -> Vec<NotificationRequest> {
        let Some(idx) = instance.current_step_index() else {
            return Vec::new();
        };
        let Some(action) = self.evaluate(instance, idx, now) else {
            return Vec::new();
        };

        let stamp = now.max(instance.updated_at);
        let booking = instance.metadata.booking_number.clone();
        let step = &mut instance.steps[idx];
        let step_id = step.id;

        let (notification_type, recipient, message) = match action {
            TimeoutAction::Warn { due_in } => {
                step.warned_at = Some(stamp);
                report.warnings_sent += 1;
                let role = step.assigned_to_role.clone().unwrap_or_default();
                (
                    NotificationType::TimeoutWarning,
                    Recipient::Role(role),
                    format!(
                        "'{}' for booking {} times out in {}",
                        step.name,
                        booking,
                        format_duration(due_in.num_minutes())
                    ),
                )
            }
            TimeoutAction::Escalate { overdue_by } => {
                step.escalated_at = Some(stamp);
                report.escalations_triggered += 1;
                let contact = self
                    .engine
                    .config()
                    .escalation_contact(step.assigned_to_role.as_deref());
                warn!(
                    "Step {} of workflow {} is overdue, escalating to {}",
                    step_id, instance.id, contact
                );
                (
                    NotificationType::StepEscalated,
                    Recipient::Role(contact),
                    format!(
                        "'{}' for booking {} is overdue by {} (assigned to {})",
                        step.name,
                        booking,
                        format_duration(overdue_by.num_minutes()),
                        step.assigned_to_role.as_deref().unwrap_or("nobody")
                    ),
                )
            }
        };

        let request = NotificationRequest::new(
            notification_type,
            recipient,
            message,
            instance.id,
            Some(step_id),
            stamp,
        );
        instance.notifications.push(request.clone());
        instance.updated_at = stamp;
        vec![request]
    }

    fn evaluate(&self, instance: &WorkflowInstance, idx: usize, now: DateTime<Utc>) -> Option<TimeoutAction> {
        let step = &instance.steps[idx];
        if step.step_type == StepType::Automatic {
            return None;
        }
        let due = step.due_at()?;

        if now > due {
            return step
                .escalated_at
                .is_none()
                .then(|| TimeoutAction::Escalate { overdue_by: now - due });
        }

        let warning_due = step.warned_at.is_none()
            && step.escalated_at.is_none()
            && self.warning_lead > Duration::zero()
            && now >= due - self.warning_lead;
        warning_due.then(|| TimeoutAction::Warn { due_in: due - now })
    }
}

fn format_duration(minutes: i64) -> String {
    if minutes < 60 {
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        }
    } else {
        let days = minutes / 1440;
        let hours = (minutes % 1440) / 60;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{} day{}", days, if days == 1 { "" } else { "s" })
        }
    }
}
