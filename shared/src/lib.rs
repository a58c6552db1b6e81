use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when a wire string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Standard,
    Vip,
    Corporate,
    Group,
}

wire_enum!(WorkflowType, "workflow type", {
    Standard => "standard",
    Vip => "vip",
    Corporate => "corporate",
    Group => "group",
});

/// Operator attention priority. Variants are declared low to high so the
/// derived ordering matches the rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

wire_enum!(Priority, "priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

wire_enum!(WorkflowStatus, "workflow status", {
    Active => "active",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Automatic,
    Manual,
    Approval,
}

wire_enum!(StepType, "step type", {
    Automatic => "automatic",
    Manual => "manual",
    Approval => "approval",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

wire_enum!(StepStatus, "step status", {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

impl StepStatus {
    /// Completed or skipped: the step no longer blocks its successors.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed)
    }
}

/// Side effect run by an automatic step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AutomaticAction {
    ValidateReservation,
    NotifyDutyManager,
    ConfirmRoomBlock,
    SendConfirmation,
}

/// Reservation data captured when a workflow is created. Never re-fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationSnapshot {
    pub reservation_id: String,
    pub booking_number: String,
    pub guest_name: String,
    #[serde(default)]
    pub guest_tier: String,
    pub room_type: String,
    pub total_amount: Decimal,
    #[serde(default = "default_room_count")]
    pub room_count: u32,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub check_in: Option<NaiveDate>,
}

fn default_room_count() -> u32 {
    1
}

impl ReservationSnapshot {
    pub fn is_vip(&self) -> bool {
        self.guest_tier.trim().eq_ignore_ascii_case("vip")
    }

    pub fn is_corporate(&self) -> bool {
        self.company_name
            .as_deref()
            .map(|name| !name.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StepAssigned,
    TimeoutWarning,
    StepEscalated,
    DutyManagerAlert,
    RoomBlockConfirmed,
    ReservationConfirmed,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,
}

wire_enum!(NotificationType, "notification type", {
    StepAssigned => "step_assigned",
    TimeoutWarning => "timeout_warning",
    StepEscalated => "step_escalated",
    DutyManagerAlert => "duty_manager_alert",
    RoomBlockConfirmed => "room_block_confirmed",
    ReservationConfirmed => "reservation_confirmed",
    WorkflowCompleted => "workflow_completed",
    WorkflowFailed => "workflow_failed",
    WorkflowCancelled => "workflow_cancelled",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    Role(String),
    Staff(String),
    Guest(String),
}

/// A structured request handed to the notification gateway. Delivery is the
/// gateway's concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRequest {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub recipient: Recipient,
    pub message: String,
    pub workflow_id: Uuid,
    pub step_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(
        notification_type: NotificationType,
        recipient: Recipient,
        message: impl Into<String>,
        workflow_id: Uuid,
        step_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification_type,
            recipient,
            message: message.into(),
            workflow_id,
            step_id,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub description: String,
    pub step_type: StepType,
    pub status: StepStatus,
    pub assigned_to_role: Option<String>,
    pub auto_execute: bool,
    pub timeout_minutes: Option<u32>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub skippable: bool,
    pub action: Option<AutomaticAction>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub notes: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub warned_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
}

impl WorkflowStep {
    /// When the step's timeout elapses, if it has one and has been started.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let started_at = self.started_at?;
        let minutes = self.timeout_minutes?;
        Some(started_at + Duration::minutes(i64::from(minutes)))
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == StepStatus::InProgress
            && self.due_at().map(|due| now > due).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub reservation_id: String,
    pub workflow_type: WorkflowType,
    pub priority: Priority,
    pub status: WorkflowStatus,
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub metadata: ReservationSnapshot,
    pub notifications: Vec<NotificationRequest>,
    pub cancellation_reason: Option<String>,
}

impl WorkflowInstance {
    /// Status as a pure function of step statuses. Cancellation is an explicit
    /// external transition and is never derived away.
    pub fn derived_status(&self) -> WorkflowStatus {
        if self.status == WorkflowStatus::Cancelled {
            WorkflowStatus::Cancelled
        } else if self.steps.iter().any(|s| s.status == StepStatus::Failed) {
            WorkflowStatus::Failed
        } else if self.steps.iter().all(|s| s.status.is_done()) {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Active
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == StepStatus::InProgress)
    }

    pub fn current_step(&self) -> Option<&WorkflowStep> {
        self.current_step_index().map(|idx| &self.steps[idx])
    }

    pub fn step(&self, step_id: Uuid) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Role of the step currently waiting on a human, if any.
    pub fn current_role(&self) -> Option<&str> {
        self.current_step().and_then(|s| s.assigned_to_role.as_deref())
    }

    pub fn in_progress_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::InProgress)
            .count()
    }

    /// Completion time of the final step, used for turnaround statistics.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.steps.last().and_then(|s| s.completed_at)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.current_step().map(|s| s.is_overdue(now)).unwrap_or(false)
    }
}

/// Query filters for the active workflow listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowFilter {
    pub status: Option<WorkflowStatus>,
    pub priority: Option<Priority>,
    pub workflow_type: Option<WorkflowType>,
    pub assigned_role: Option<String>,
}

impl WorkflowFilter {
    pub fn matches(&self, instance: &WorkflowInstance) -> bool {
        if let Some(status) = self.status {
            if instance.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if instance.priority != priority {
                return false;
            }
        }
        if let Some(workflow_type) = self.workflow_type {
            if instance.workflow_type != workflow_type {
                return false;
            }
        }
        if let Some(role) = &self.assigned_role {
            if instance.current_role() != Some(role.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowStats {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub overdue: usize,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_type: BTreeMap<WorkflowType, usize>,
    pub avg_completion_minutes: f64,
}
