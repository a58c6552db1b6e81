// Workflow Actions - Side effects of automatic steps

use concierge_shared::{AutomaticAction, NotificationType, Recipient};
use serde::{Deserialize, Serialize};

/// Human-readable label for an automatic action
pub fn action_label(action: AutomaticAction) -> &'static str {
    match action {
        AutomaticAction::ValidateReservation => "validate reservation",
        AutomaticAction::NotifyDutyManager => "notify duty manager",
        AutomaticAction::ConfirmRoomBlock => "confirm room block",
        AutomaticAction::SendConfirmation => "send confirmation",
    }
}

/// A notification an action wants emitted. The transition engine stamps the
/// workflow, step and time when it commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingNotification {
    pub notification_type: NotificationType,
    pub recipient: Recipient,
    pub message: String,
}

/// Result of executing an automatic action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub notifications: Vec<PendingNotification>,
}

impl ActionResult {
    pub fn success(output: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            notifications: Vec::new(),
        }
    }

    pub fn failure(error: &str) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
            notifications: Vec::new(),
        }
    }

    pub fn notify(
        mut self,
        notification_type: NotificationType,
        recipient: Recipient,
        message: String,
    ) -> Self {
        self.notifications.push(PendingNotification {
            notification_type,
            recipient,
            message,
        });
        self
    }

    /// Step notes recorded on completion
    pub fn summary(&self, action: AutomaticAction) -> String {
        match &self.error {
            Some(error) => format!("{} failed: {}", action_label(action), error),
            None => format!("{} succeeded", action_label(action)),
        }
    }
}
