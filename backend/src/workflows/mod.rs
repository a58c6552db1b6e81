// Reservation Workflow Engine
//
// Drives each reservation through an ordered sequence of operational steps
// whose shape depends on the reservation's classification and priority.

pub mod actions;
pub mod clock;
pub mod engine;
pub mod error;
pub mod executor;
pub mod priority;
pub mod stats;
pub mod store;
pub mod templates;
pub mod transitions;
pub mod triggers;

pub use actions::{ActionResult, PendingNotification, action_label};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::WorkflowEngine;
pub use error::{StepStateViolation, WorkflowError, WorkflowResult};
pub use executor::StepExecutor;
pub use priority::PriorityScheduler;
pub use stats::StatsAggregator;
pub use store::{CreateOutcome, InstanceHandle, WorkflowStore, instantiate_workflow};
pub use templates::{StepBlueprint, TemplateCatalog};
pub use transitions::{SYSTEM_ACTOR, StepTransitionEngine};
pub use triggers::{
    Classification, EventSource, ReservationEvent, ReservationEventKind, classify,
};
