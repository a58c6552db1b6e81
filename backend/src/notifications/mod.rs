// Notification Gateway - Hand-off of workflow notifications to delivery channels
//
// The engine produces structured notification requests; delivery (email, SMS,
// push) belongs to whatever gateway the host plugs in. Gateway failures are
// logged and never roll back the workflow change that produced them.

use async_trait::async_trait;
use concierge_shared::{NotificationRequest, Recipient};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    /// Nobody was listening and the gateway discarded the request. The
    /// instance still carries it in its notification log.
    NoSubscribers,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery channel unavailable: {0}")]
    Unavailable(String),
    #[error("Recipient rejected: {0}")]
    Rejected(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, request: &NotificationRequest) -> Result<DeliveryStatus, NotificationError>;
}

/// Writes every notification to the log. Default gateway for the service binary.
#[derive(Debug, Default, Clone)]
pub struct LoggingGateway;

#[async_trait]
impl NotificationGateway for LoggingGateway {
    async fn send(&self, request: &NotificationRequest) -> Result<DeliveryStatus, NotificationError> {
        info!(
            notification_id = %request.id,
            workflow_id = %request.workflow_id,
            kind = %request.notification_type,
            recipient = %describe_recipient(&request.recipient),
            "{}",
            request.message
        );
        Ok(DeliveryStatus::Delivered)
    }
}

/// Fans notifications out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastGateway {
    sender: broadcast::Sender<NotificationRequest>,
}

impl BroadcastGateway {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationRequest> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastGateway {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl NotificationGateway for BroadcastGateway {
    async fn send(&self, request: &NotificationRequest) -> Result<DeliveryStatus, NotificationError> {
        match self.sender.send(request.clone()) {
            Ok(_) => Ok(DeliveryStatus::Delivered),
            Err(_) => Ok(DeliveryStatus::NoSubscribers),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Sends committed notifications through the configured gateway
#[derive(Clone)]
pub struct NotificationDispatcher {
    gateway: Arc<dyn NotificationGateway>,
}

impl NotificationDispatcher {
    pub fn new(gateway: Arc<dyn NotificationGateway>) -> Self {
        Self { gateway }
    }

    pub async fn dispatch(&self, requests: &[NotificationRequest]) -> DispatchSummary {
        if requests.is_empty() {
            return DispatchSummary::default();
        }

        let results = join_all(requests.iter().map(|r| self.gateway.send(r))).await;

        let mut summary = DispatchSummary::default();
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(status) => {
                    debug!("Notification {} {:?}", request.id, status);
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to deliver {} notification {} for workflow {}: {}",
                        request.notification_type, request.id, request.workflow_id, e
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher").finish_non_exhaustive()
    }
}

fn describe_recipient(recipient: &Recipient) -> String {
    match recipient {
        Recipient::Role(role) => format!("role:{}", role),
        Recipient::Staff(id) => format!("staff:{}", id),
        Recipient::Guest(reservation) => format!("guest:{}", reservation),
    }
}
