// Workflow Triggers - Reservation events that start or stop workflows

use chrono::{DateTime, Utc};
use concierge_shared::{Priority, ReservationSnapshot, WorkflowType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Clock;
use crate::config::EngineConfig;

/// What happened to the reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReservationEventKind {
    Created { snapshot: ReservationSnapshot },
    Cancelled { reservation_id: String, reason: Option<String> },
}

/// Source of the reservation event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventSource {
    System,
    Staff(String),
    BookingEngine,
    Api,
}

impl EventSource {
    /// Actor identifier recorded on instances and steps
    pub fn actor(&self) -> String {
        match self {
            Self::System => "system".to_string(),
            Self::Staff(id) => id.clone(),
            Self::BookingEngine => "booking_engine".to_string(),
            Self::Api => "api".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub event_id: Uuid,
    pub kind: ReservationEventKind,
    pub source: EventSource,
    pub timestamp: DateTime<Utc>,
}

impl ReservationEvent {
    /// Stamped with the engine's clock so replays and tests see one timeline
    pub fn new(kind: ReservationEventKind, source: EventSource, clock: &dyn Clock) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            source,
            timestamp: clock.now(),
        }
    }

    pub fn created(snapshot: ReservationSnapshot, source: EventSource, clock: &dyn Clock) -> Self {
        Self::new(ReservationEventKind::Created { snapshot }, source, clock)
    }

    pub fn cancelled(
        reservation_id: &str,
        reason: Option<&str>,
        source: EventSource,
        clock: &dyn Clock,
    ) -> Self {
        Self::new(
            ReservationEventKind::Cancelled {
                reservation_id: reservation_id.to_string(),
                reason: reason.map(str::to_string),
            },
            source,
            clock,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub workflow_type: WorkflowType,
    pub priority: Priority,
}

/// Derive the workflow type and priority from reservation attributes
pub fn classify(snapshot: &ReservationSnapshot, config: &EngineConfig) -> Classification {
    let workflow_type = if snapshot.is_vip() {
        WorkflowType::Vip
    } else if snapshot.is_corporate() {
        WorkflowType::Corporate
    } else if snapshot.room_count >= config.group_room_threshold {
        WorkflowType::Group
    } else {
        WorkflowType::Standard
    };

    let priority = if snapshot.total_amount >= config.urgent_value_amount {
        Priority::Urgent
    } else if snapshot.is_vip() || snapshot.total_amount >= config.high_value_amount {
        Priority::High
    } else if matches!(workflow_type, WorkflowType::Corporate | WorkflowType::Group) {
        Priority::Medium
    } else {
        Priority::Low
    };

    Classification {
        workflow_type,
        priority,
    }
}
