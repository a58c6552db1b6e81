// Workflow Templates - Step sequences per reservation classification

use concierge_shared::{
    AutomaticAction, Priority, ReservationSnapshot, StepStatus, StepType, WorkflowStep, WorkflowType,
};
use tracing::warn;
use uuid::Uuid;

use super::{WorkflowError, WorkflowResult};
use crate::config::EngineConfig;

pub const ROLE_FRONT_OFFICE_MANAGER: &str = "front_office_manager";
pub const ROLE_FINANCE: &str = "finance";
pub const ROLE_FRONT_DESK: &str = "front_desk";
pub const ROLE_SALES: &str = "sales";

/// Template-defined, immutable description of a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepBlueprint {
    pub key: String,
    pub name: String,
    pub description: String,
    pub step_type: StepType,
    pub auto_execute: bool,
    pub assigned_to_role: Option<String>,
    pub timeout_minutes: Option<u32>,
    pub required_fields: Vec<String>,
    pub skippable: bool,
    pub action: Option<AutomaticAction>,
}

impl StepBlueprint {
    pub fn automatic(key: &str, name: &str, description: String, action: AutomaticAction) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description,
            step_type: StepType::Automatic,
            auto_execute: true,
            assigned_to_role: None,
            timeout_minutes: None,
            required_fields: Vec::new(),
            skippable: false,
            action: Some(action),
        }
    }

    pub fn approval(key: &str, name: &str, description: String, role: &str, timeout_minutes: u32) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description,
            step_type: StepType::Approval,
            auto_execute: false,
            assigned_to_role: Some(role.to_string()),
            timeout_minutes: Some(timeout_minutes),
            required_fields: Vec::new(),
            skippable: false,
            action: None,
        }
    }

    pub fn manual(
        key: &str,
        name: &str,
        description: String,
        role: &str,
        timeout_minutes: u32,
        required_fields: &[&str],
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description,
            step_type: StepType::Manual,
            auto_execute: false,
            assigned_to_role: Some(role.to_string()),
            timeout_minutes: Some(timeout_minutes),
            required_fields: required_fields.iter().map(|f| f.to_string()).collect(),
            skippable: false,
            action: None,
        }
    }

    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Materialize a pending step for a new workflow instance
    pub fn instantiate(&self) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::new_v4(),
            key: self.key.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            step_type: self.step_type,
            status: StepStatus::Pending,
            assigned_to_role: self.assigned_to_role.clone(),
            auto_execute: self.auto_execute,
            timeout_minutes: self.timeout_minutes,
            required_fields: self.required_fields.clone(),
            skippable: self.skippable,
            action: self.action,
            started_at: None,
            completed_at: None,
            completed_by: None,
            notes: None,
            payload: None,
            warned_at: None,
            escalated_at: None,
        }
    }
}

/// Maps a classification to its ordered step blueprints. Holds no state beyond
/// configuration, so the same inputs always produce the same sequence.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    approval_timeout_minutes: u32,
    manual_timeout_minutes: u32,
    fallback_to_standard: bool,
}

impl TemplateCatalog {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            approval_timeout_minutes: config.approval_timeout_minutes,
            manual_timeout_minutes: config.manual_timeout_minutes,
            fallback_to_standard: config.fallback_to_standard,
        }
    }

    /// Resolve a wire name to a template
    pub fn resolve(&self, name: &str) -> WorkflowResult<WorkflowType> {
        match name.parse::<WorkflowType>() {
            Ok(workflow_type) => Ok(workflow_type),
            Err(_) if self.fallback_to_standard => {
                warn!("Unknown workflow type '{}', falling back to standard", name);
                Ok(WorkflowType::Standard)
            }
            Err(_) => Err(WorkflowError::UnknownTemplate(name.to_string())),
        }
    }

    pub fn build_steps(
        &self,
        workflow_type: WorkflowType,
        priority: Priority,
        attributes: &ReservationSnapshot,
    ) -> Vec<StepBlueprint> {
        let mut steps = vec![validate_step(attributes)];

        if priority == Priority::Urgent {
            steps.push(StepBlueprint::automatic(
                "notify_duty_manager",
                "Notify duty manager",
                format!(
                    "Alert the duty manager about urgent booking {}",
                    attributes.booking_number
                ),
                AutomaticAction::NotifyDutyManager,
            ));
        }

        match workflow_type {
            WorkflowType::Standard => {}
            WorkflowType::Vip => {
                steps.push(StepBlueprint::approval(
                    "vip_welcome_approval",
                    "VIP welcome approval",
                    format!("Approve VIP welcome arrangements for {}", attributes.guest_name),
                    ROLE_FRONT_OFFICE_MANAGER,
                    self.approval_timeout_minutes,
                ));
                steps.push(StepBlueprint::manual(
                    "assign_room",
                    "Room assignment",
                    format!("Assign a {} room to {}", attributes.room_type, attributes.guest_name),
                    ROLE_FRONT_DESK,
                    self.manual_timeout_minutes,
                    &["room_number"],
                ));
            }
            WorkflowType::Corporate => {
                let company = attributes.company_name.as_deref().unwrap_or("corporate account");
                steps.push(StepBlueprint::approval(
                    "credit_verification",
                    "Credit verification",
                    format!(
                        "Verify credit for {} covering {}",
                        company, attributes.total_amount
                    ),
                    ROLE_FINANCE,
                    self.approval_timeout_minutes,
                ));
            }
            WorkflowType::Group => {
                steps.push(StepBlueprint::automatic(
                    "room_block_confirmation",
                    "Room block confirmation",
                    format!(
                        "Hold a block of {} {} rooms",
                        attributes.room_count, attributes.room_type
                    ),
                    AutomaticAction::ConfirmRoomBlock,
                ));
                steps.push(
                    StepBlueprint::manual(
                        "group_contract_review",
                        "Group contract review",
                        format!("Review the group contract for booking {}", attributes.booking_number),
                        ROLE_SALES,
                        self.manual_timeout_minutes,
                        &["contract_reference"],
                    )
                    .skippable(),
                );
            }
        }

        steps.push(StepBlueprint::automatic(
            "send_confirmation",
            "Send confirmation",
            format!("Send the booking confirmation to {}", attributes.guest_name),
            AutomaticAction::SendConfirmation,
        ));

        steps
    }
}

fn validate_step(attributes: &ReservationSnapshot) -> StepBlueprint {
    StepBlueprint::automatic(
        "validate_reservation",
        "Validate reservation",
        format!("Check reservation data for booking {}", attributes.booking_number),
        AutomaticAction::ValidateReservation,
    )
}
