// Workflow Engine - Core reservation workflow processing and management

use chrono::{DateTime, Utc};
use concierge_shared::{
    NotificationRequest, Priority, ReservationSnapshot, WorkflowFilter, WorkflowInstance,
    WorkflowStats, WorkflowType,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{instantiate_workflow, CreateOutcome, WorkflowStore};
use super::{
    classify, Clock, ReservationEvent, ReservationEventKind, StatsAggregator, StepExecutor,
    StepTransitionEngine, TemplateCatalog, WorkflowError, WorkflowResult,
};
use crate::config::EngineConfig;
use crate::notifications::{NotificationDispatcher, NotificationGateway};
use crate::roles::RoleDirectory;

pub struct WorkflowEngine {
    store: Arc<WorkflowStore>,
    catalog: TemplateCatalog,
    transitions: StepTransitionEngine,
    dispatcher: NotificationDispatcher,
    roles: Arc<dyn RoleDirectory>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn NotificationGateway>,
        roles: Arc<dyn RoleDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            "Initializing workflow engine (fallback_to_standard: {})",
            config.fallback_to_standard
        );

        Self {
            store: Arc::new(WorkflowStore::new()),
            catalog: TemplateCatalog::new(&config),
            transitions: StepTransitionEngine::new(StepExecutor::new(&config)),
            dispatcher: NotificationDispatcher::new(gateway),
            roles,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<WorkflowStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// React to a reservation lifecycle event. Returns the affected workflow,
    /// or `None` when a cancellation refers to a reservation without one.
    pub async fn process_event(&self, event: ReservationEvent) -> WorkflowResult<Option<WorkflowInstance>> {
        let actor = event.source.actor();
        debug!("Processing reservation event {} from {}", event.event_id, actor);

        match event.kind {
            ReservationEventKind::Created { snapshot } => {
                let outcome = self.create_workflow(snapshot, &actor).await;
                Ok(Some(outcome.into_instance()))
            }
            ReservationEventKind::Cancelled {
                reservation_id,
                reason,
            } => match self.store.find_by_reservation(&reservation_id).await {
                Some(workflow_id) => self
                    .cancel_workflow(workflow_id, &actor, reason)
                    .await
                    .map(Some),
                None => {
                    debug!("No active workflow for cancelled reservation {}", reservation_id);
                    Ok(None)
                }
            },
        }
    }

    /// Create a workflow with the type and priority derived from the reservation
    pub async fn create_workflow(&self, snapshot: ReservationSnapshot, created_by: &str) -> CreateOutcome {
        let classification = classify(&snapshot, &self.config);
        self.create_classified(
            snapshot,
            classification.workflow_type,
            classification.priority,
            created_by,
        )
        .await
    }

    /// Create a workflow with an explicit template name and priority
    pub async fn create_workflow_with(
        &self,
        snapshot: ReservationSnapshot,
        workflow_type: &str,
        priority: Priority,
        created_by: &str,
    ) -> WorkflowResult<CreateOutcome> {
        let workflow_type = self.catalog.resolve(workflow_type)?;
        Ok(self
            .create_classified(snapshot, workflow_type, priority, created_by)
            .await)
    }

    async fn create_classified(
        &self,
        snapshot: ReservationSnapshot,
        workflow_type: WorkflowType,
        priority: Priority,
        created_by: &str,
    ) -> CreateOutcome {
        let blueprints = self.catalog.build_steps(workflow_type, priority, &snapshot);
        let reservation_id = snapshot.reservation_id.clone();
        let now = self.clock.now();
        let mut emitted = Vec::new();

        let outcome = self
            .store
            .create_with(&reservation_id, || {
                let mut instance =
                    instantiate_workflow(&blueprints, snapshot, workflow_type, priority, created_by, now);
                emitted = self.transitions.begin(&mut instance, now);
                instance
            })
            .await;

        if outcome.is_created() {
            self.dispatcher.dispatch(&emitted).await;
        }
        outcome
    }

    pub async fn get_workflow(&self, workflow_id: Uuid) -> WorkflowResult<WorkflowInstance> {
        self.store.get(workflow_id).await
    }

    pub async fn list_active_workflows(&self, filter: &WorkflowFilter) -> Vec<WorkflowInstance> {
        self.store.list_active(filter).await
    }

    pub async fn list_history(&self, filter: &WorkflowFilter) -> Vec<WorkflowInstance> {
        self.store.list_history(filter).await
    }

    pub async fn get_workflow_stats(&self) -> WorkflowStats {
        let instances = self.store.all_instances().await;
        StatsAggregator::compute(&instances, self.clock.now())
    }

    /// Staff currently able to act on the workflow, resolved at read time
    pub async fn assignees(&self, workflow_id: Uuid) -> WorkflowResult<Vec<String>> {
        let instance = self.store.get(workflow_id).await?;
        Ok(instance
            .current_role()
            .map(|role| self.roles.resolve_role(role))
            .unwrap_or_default())
    }

    pub async fn start_step(&self, workflow_id: Uuid, step_id: Uuid, actor: &str) -> WorkflowResult<WorkflowInstance> {
        self.transition(workflow_id, |instance, now| {
            self.transitions.start_step(instance, step_id, actor, now)
        })
        .await
    }

    pub async fn approve_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        actor: &str,
        notes: Option<String>,
    ) -> WorkflowResult<WorkflowInstance> {
        self.transition(workflow_id, |instance, now| {
            self.transitions.approve(instance, step_id, actor, notes, now)
        })
        .await
    }

    pub async fn reject_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        actor: &str,
        notes: Option<String>,
    ) -> WorkflowResult<WorkflowInstance> {
        self.transition(workflow_id, |instance, now| {
            self.transitions.reject(instance, step_id, actor, notes, now)
        })
        .await
    }

    pub async fn complete_manual_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        actor: &str,
        payload: serde_json::Value,
    ) -> WorkflowResult<WorkflowInstance> {
        self.transition(workflow_id, |instance, now| {
            self.transitions.complete_manual(instance, step_id, actor, payload, now)
        })
        .await
    }

    pub async fn skip_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        actor: &str,
        notes: Option<String>,
    ) -> WorkflowResult<WorkflowInstance> {
        self.transition(workflow_id, |instance, now| {
            self.transitions.skip(instance, step_id, actor, notes, now)
        })
        .await
    }

    pub async fn reset_escalation(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        actor: &str,
    ) -> WorkflowResult<WorkflowInstance> {
        self.transition(workflow_id, |instance, now| {
            self.transitions
                .reset_escalation(instance, step_id, actor, now)
                .map(|_| Vec::new())
        })
        .await
    }

    /// Cancel regardless of step state. Cancelling a terminal workflow returns
    /// it unchanged.
    pub async fn cancel_workflow(
        &self,
        workflow_id: Uuid,
        actor: &str,
        reason: Option<String>,
    ) -> WorkflowResult<WorkflowInstance> {
        let result = self
            .transition(workflow_id, |instance, now| {
                Ok(self
                    .transitions
                    .cancel(instance, actor, reason, now)
                    .unwrap_or_default())
            })
            .await;

        match result {
            Err(WorkflowError::WorkflowTerminated { .. }) => self.store.get(workflow_id).await,
            other => other,
        }
    }

    /// Apply an operation to a working copy under the instance lock and commit
    /// it only on success. Notifications go out after the lock is released.
    async fn transition<F>(&self, workflow_id: Uuid, op: F) -> WorkflowResult<WorkflowInstance>
    where
        F: FnOnce(&mut WorkflowInstance, DateTime<Utc>) -> WorkflowResult<Vec<NotificationRequest>>,
    {
        let handle = self.store.handle(workflow_id).await?;

        let (snapshot, emitted) = {
            let mut guard = handle.lock().await;
            let was_terminal = guard.is_terminal();

            let mut working = guard.clone();
            let emitted = op(&mut working, self.clock.now())?;
            *guard = working;

            if !was_terminal && guard.is_terminal() {
                self.store.retire(&guard).await;
            }
            (guard.clone(), emitted)
        };

        self.dispatcher.dispatch(&emitted).await;
        Ok(snapshot)
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
