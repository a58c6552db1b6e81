// Priority Scheduler - Ordering of workflow listings

use concierge_shared::WorkflowInstance;

pub struct PriorityScheduler;

impl PriorityScheduler {
    /// Highest priority first, newest first within a priority. The sort is
    /// stable, so instances created in the same instant keep their input order.
    pub fn order(mut instances: Vec<WorkflowInstance>) -> Vec<WorkflowInstance> {
        instances.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        instances
    }
}
