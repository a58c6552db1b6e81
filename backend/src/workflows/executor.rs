// Workflow Executor - Runs the side effects of automatic steps

use concierge_shared::{AutomaticAction, NotificationType, Recipient, ReservationSnapshot};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::ActionResult;
use super::templates::ROLE_SALES;
use crate::config::EngineConfig;

const DUTY_MANAGER_TEMPLATE: &str =
    "Urgent booking {{booking_number}} for {{guest_name}} ({{total_amount}}) needs attention";
const ROOM_BLOCK_TEMPLATE: &str =
    "Room block held: {{room_count}} x {{room_type}} for booking {{booking_number}}";
const CONFIRMATION_TEMPLATE: &str =
    "Dear {{guest_name}}, your {{room_type}} booking {{booking_number}} is confirmed";

#[derive(Debug, Clone)]
pub struct StepExecutor {
    duty_manager_role: String,
}

impl StepExecutor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            duty_manager_role: config.default_escalation_role.clone(),
        }
    }

    /// Execute an automatic action against the workflow's reservation snapshot.
    /// Never panics; problems are reported as a failed result.
    pub fn execute(&self, action: AutomaticAction, snapshot: &ReservationSnapshot) -> ActionResult {
        let context = serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null);

        let result = match action {
            AutomaticAction::ValidateReservation => self.validate_reservation(snapshot),
            AutomaticAction::NotifyDutyManager => ActionResult::success(None).notify(
                NotificationType::DutyManagerAlert,
                Recipient::Role(self.duty_manager_role.clone()),
                render_template(DUTY_MANAGER_TEMPLATE, &context),
            ),
            AutomaticAction::ConfirmRoomBlock => ActionResult::success(Some(serde_json::json!({
                "rooms_held": snapshot.room_count,
                "room_type": snapshot.room_type,
            })))
            .notify(
                NotificationType::RoomBlockConfirmed,
                Recipient::Role(ROLE_SALES.to_string()),
                render_template(ROOM_BLOCK_TEMPLATE, &context),
            ),
            AutomaticAction::SendConfirmation => ActionResult::success(Some(serde_json::json!({
                "booking_number": snapshot.booking_number,
            })))
            .notify(
                NotificationType::ReservationConfirmed,
                Recipient::Guest(snapshot.reservation_id.clone()),
                render_template(CONFIRMATION_TEMPLATE, &context),
            ),
        };

        if result.success {
            info!("Automatic action '{:?}' succeeded for {}", action, snapshot.reservation_id);
        } else {
            warn!(
                "Automatic action '{:?}' failed for {}: {:?}",
                action, snapshot.reservation_id, result.error
            );
        }

        result
    }

    fn validate_reservation(&self, snapshot: &ReservationSnapshot) -> ActionResult {
        let mut problems = Vec::new();

        if snapshot.reservation_id.trim().is_empty() {
            problems.push("reservation_id is empty");
        }
        if snapshot.booking_number.trim().is_empty() {
            problems.push("booking_number is empty");
        }
        if snapshot.guest_name.trim().is_empty() {
            problems.push("guest_name is empty");
        }
        if snapshot.room_type.trim().is_empty() {
            problems.push("room_type is empty");
        }
        if snapshot.total_amount < Decimal::ZERO {
            problems.push("total_amount is negative");
        }
        if snapshot.room_count == 0 {
            problems.push("room_count is zero");
        }

        if problems.is_empty() {
            ActionResult::success(Some(serde_json::json!({ "valid": true })))
        } else {
            ActionResult::failure(&format!("invalid reservation: {}", problems.join(", ")))
        }
    }
}

/// Replace `{{field}}` placeholders with values from the context object
fn render_template(template: &str, context: &serde_json::Value) -> String {
    let Ok(re) = regex::Regex::new(r"\{\{([^}]+)\}\}") else {
        return template.to_string();
    };

    let mut result = template.to_string();
    for cap in re.captures_iter(template) {
        let Some(value) = get_nested_value(context, cap[1].trim()) else {
            continue;
        };
        let replacement = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        };
        result = result.replace(&cap[0], &replacement);
    }
    result
}

fn get_nested_value(json: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
    let mut current = json;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}
