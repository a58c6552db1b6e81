// Workflow Store - In-memory registry of active and historical instances
//
// Active instances live behind their own mutex so that operations on different
// workflows never contend. Map locks are always taken in the order
// by_reservation, active, history and are never held across an await on an
// instance lock.

use chrono::{DateTime, Utc};
use concierge_shared::{
    Priority, ReservationSnapshot, WorkflowFilter, WorkflowInstance, WorkflowStatus, WorkflowType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::templates::StepBlueprint;
use super::{PriorityScheduler, WorkflowError, WorkflowResult};

pub type InstanceHandle = Arc<Mutex<WorkflowInstance>>;

/// Build a fresh active instance with every step pending
pub fn instantiate_workflow(
    blueprints: &[StepBlueprint],
    metadata: ReservationSnapshot,
    workflow_type: WorkflowType,
    priority: Priority,
    created_by: &str,
    now: DateTime<Utc>,
) -> WorkflowInstance {
    WorkflowInstance {
        id: Uuid::new_v4(),
        reservation_id: metadata.reservation_id.clone(),
        workflow_type,
        priority,
        status: WorkflowStatus::Active,
        steps: blueprints.iter().map(StepBlueprint::instantiate).collect(),
        created_at: now,
        updated_at: now,
        created_by: created_by.to_string(),
        metadata,
        notifications: Vec::new(),
        cancellation_reason: None,
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(WorkflowInstance),
    /// The reservation already had an active workflow
    Existing(WorkflowInstance),
}

impl CreateOutcome {
    pub fn instance(&self) -> &WorkflowInstance {
        match self {
            Self::Created(instance) | Self::Existing(instance) => instance,
        }
    }

    pub fn into_instance(self) -> WorkflowInstance {
        match self {
            Self::Created(instance) | Self::Existing(instance) => instance,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Clone)]
struct ActiveEntry {
    seq: u64,
    handle: InstanceHandle,
}

#[derive(Debug, Default)]
pub struct WorkflowStore {
    active: RwLock<HashMap<Uuid, ActiveEntry>>,
    by_reservation: RwLock<HashMap<String, Uuid>>,
    history: RwLock<HashMap<Uuid, WorkflowInstance>>,
    seq: AtomicU64,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow for the reservation unless one is already active.
    /// `build` runs under the reservation index lock, so two concurrent
    /// creations for the same reservation yield one instance. A workflow that
    /// turned terminal while we waited for its lock is never reported as the
    /// existing one.
    pub async fn create_with<F>(&self, reservation_id: &str, build: F) -> CreateOutcome
    where
        F: FnOnce() -> WorkflowInstance,
    {
        let mut by_reservation = loop {
            let mut by_reservation = self.by_reservation.write().await;

            let Some(existing_id) = by_reservation.get(reservation_id).copied() else {
                break by_reservation;
            };
            let handle = self.active.read().await.get(&existing_id).map(|e| e.handle.clone());
            let Some(handle) = handle else {
                by_reservation.remove(reservation_id);
                break by_reservation;
            };

            drop(by_reservation);
            let existing = handle.lock().await.clone();
            if !existing.is_terminal() {
                debug!(
                    "Reservation {} already has active workflow {}",
                    reservation_id, existing_id
                );
                return CreateOutcome::Existing(existing);
            }
            // Retired under the instance lock we just waited on; the index is free now
            debug!(
                "Workflow {} finished while creating for reservation {}, retrying",
                existing_id, reservation_id
            );
        };

        let instance = build();
        if instance.is_terminal() {
            self.history.write().await.insert(instance.id, instance.clone());
        } else {
            let seq = self.seq.fetch_add(1, Ordering::SeqCst);
            by_reservation.insert(reservation_id.to_string(), instance.id);
            self.active.write().await.insert(
                instance.id,
                ActiveEntry {
                    seq,
                    handle: Arc::new(Mutex::new(instance.clone())),
                },
            );
        }

        info!(
            "Workflow {} created for reservation {} ({})",
            instance.id, reservation_id, instance.status
        );
        CreateOutcome::Created(instance)
    }

    /// Snapshot of an instance, active or historical
    pub async fn get(&self, id: Uuid) -> WorkflowResult<WorkflowInstance> {
        if let Some(handle) = self.active_handle(id).await {
            return Ok(handle.lock().await.clone());
        }
        self.history
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::workflow_not_found(id))
    }

    /// Lockable handle to an active instance
    pub async fn handle(&self, id: Uuid) -> WorkflowResult<InstanceHandle> {
        if let Some(handle) = self.active_handle(id).await {
            return Ok(handle);
        }
        match self.history.read().await.get(&id) {
            Some(instance) => Err(WorkflowError::WorkflowTerminated {
                workflow_id: id,
                status: instance.status,
            }),
            None => Err(WorkflowError::workflow_not_found(id)),
        }
    }

    async fn active_handle(&self, id: Uuid) -> Option<InstanceHandle> {
        self.active.read().await.get(&id).map(|e| e.handle.clone())
    }

    /// Active workflow of a reservation, if any
    pub async fn find_by_reservation(&self, reservation_id: &str) -> Option<Uuid> {
        self.by_reservation.read().await.get(reservation_id).copied()
    }

    /// Move a terminal instance out of the active set. The caller holds the
    /// instance lock and passes the committed snapshot.
    pub(crate) async fn retire(&self, snapshot: &WorkflowInstance) {
        let mut by_reservation = self.by_reservation.write().await;
        if by_reservation.get(&snapshot.reservation_id) == Some(&snapshot.id) {
            by_reservation.remove(&snapshot.reservation_id);
        }
        // Visible in history before it leaves the active set
        let mut active = self.active.write().await;
        self.history.write().await.insert(snapshot.id, snapshot.clone());
        active.remove(&snapshot.id);
        debug!("Workflow {} moved to history as {}", snapshot.id, snapshot.status);
    }

    /// Active instances in creation order
    pub async fn active_handles(&self) -> Vec<InstanceHandle> {
        let mut entries: Vec<ActiveEntry> = self.active.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.handle).collect()
    }

    async fn active_snapshots(&self) -> Vec<WorkflowInstance> {
        let mut snapshots = Vec::new();
        for handle in self.active_handles().await {
            let instance = handle.lock().await.clone();
            // A concurrent transition may have just finished it
            if !instance.is_terminal() {
                snapshots.push(instance);
            }
        }
        snapshots
    }

    /// Active instances matching the filter, highest priority first
    pub async fn list_active(&self, filter: &WorkflowFilter) -> Vec<WorkflowInstance> {
        let matching = self
            .active_snapshots()
            .await
            .into_iter()
            .filter(|instance| filter.matches(instance))
            .collect();
        PriorityScheduler::order(matching)
    }

    /// Terminal instances matching the filter, most recently updated first
    pub async fn list_history(&self, filter: &WorkflowFilter) -> Vec<WorkflowInstance> {
        let mut matching: Vec<WorkflowInstance> = self
            .history
            .read()
            .await
            .values()
            .filter(|instance| filter.matches(instance))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        matching
    }

    /// Every known instance, active and historical
    pub async fn all_instances(&self) -> Vec<WorkflowInstance> {
        let mut all = self.active_snapshots().await;
        let active_ids: std::collections::HashSet<Uuid> = all.iter().map(|i| i.id).collect();
        all.extend(
            self.history
                .read()
                .await
                .values()
                .filter(|i| !active_ids.contains(&i.id))
                .cloned(),
        );
        all
    }

    /// Drop historical instances last touched before the cutoff
    pub async fn purge_history_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut history = self.history.write().await;
        let before = history.len();
        history.retain(|_, instance| instance.updated_at >= cutoff);
        before - history.len()
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    pub async fn history_count(&self) -> usize {
        self.history.read().await.len()
    }
}
