// Idempotency Ledger - Exactly-once step transitions at the HTTP boundary
//
// A retried transition request (same workflow, step and operation) gets the
// response of the first successful application instead of a second attempt.
// Concurrent duplicates wait on the same slot. Operations that land on the same
// status stay distinct, so an approve never replays a manual completion.

use concierge_shared::{StepStatus, WorkflowInstance};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;
use uuid::Uuid;

use crate::workflows::WorkflowResult;

const DEFAULT_CAPACITY: usize = 10_000;

/// Step operation exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOperation {
    Start,
    Approve,
    Reject,
    Complete,
    Skip,
}

impl StepOperation {
    /// Status the step ends up in when the operation succeeds
    pub fn intended(self) -> StepStatus {
        match self {
            Self::Start => StepStatus::InProgress,
            Self::Approve | Self::Complete => StepStatus::Completed,
            Self::Reject => StepStatus::Failed,
            Self::Skip => StepStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub workflow_id: Uuid,
    pub step_id: Uuid,
    pub operation: StepOperation,
    pub intended: StepStatus,
}

impl TransitionKey {
    pub fn new(workflow_id: Uuid, step_id: Uuid, operation: StepOperation) -> Self {
        Self {
            workflow_id,
            step_id,
            operation,
            intended: operation.intended(),
        }
    }
}

type Slot = Arc<OnceCell<WorkflowInstance>>;

#[derive(Debug, Default)]
struct LedgerInner {
    slots: HashMap<TransitionKey, Slot>,
    order: VecDeque<TransitionKey>,
}

#[derive(Debug, Clone)]
pub struct IdempotencyLedger {
    inner: Arc<Mutex<LedgerInner>>,
    capacity: usize,
}

impl IdempotencyLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerInner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Run `op` unless this transition already succeeded, in which case the
    /// recorded result is returned. Failed attempts are not recorded.
    pub async fn apply_once<F, Fut>(&self, key: TransitionKey, op: F) -> WorkflowResult<WorkflowInstance>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = WorkflowResult<WorkflowInstance>>,
    {
        let slot = self.slot(key).await;

        if let Some(recorded) = slot.get() {
            debug!(
                "Replaying recorded {:?} ({:?}) of step {} in workflow {}",
                key.operation, key.intended, key.step_id, key.workflow_id
            );
            return Ok(recorded.clone());
        }

        slot.get_or_try_init(op).await.cloned()
    }

    async fn slot(&self, key: TransitionKey) -> Slot {
        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.slots.get(&key) {
            return slot.clone();
        }

        let slot: Slot = Arc::new(OnceCell::new());
        inner.slots.insert(key, slot.clone());
        inner.order.push_back(key);

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.slots.remove(&oldest);
            }
        }
        slot
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for IdempotencyLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
