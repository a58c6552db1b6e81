// Workflow Statistics - Aggregate counts across all known instances

use chrono::{DateTime, Utc};
use concierge_shared::{WorkflowInstance, WorkflowStats, WorkflowStatus};

pub struct StatsAggregator;

impl StatsAggregator {
    /// Counts by status, priority and type, overdue active workflows, and the
    /// mean creation-to-completion time of completed workflows in minutes.
    pub fn compute(instances: &[WorkflowInstance], now: DateTime<Utc>) -> WorkflowStats {
        let mut stats = WorkflowStats::default();
        let mut total_minutes = 0.0;
        let mut timed = 0usize;

        for instance in instances {
            match instance.status {
                WorkflowStatus::Active => {
                    stats.active += 1;
                    if instance.is_overdue(now) {
                        stats.overdue += 1;
                    }
                }
                WorkflowStatus::Completed => {
                    stats.completed += 1;
                    if let Some(done) = instance.completed_at() {
                        let elapsed = done.signed_duration_since(instance.created_at);
                        total_minutes += elapsed.num_milliseconds() as f64 / 60_000.0;
                        timed += 1;
                    }
                }
                WorkflowStatus::Failed => stats.failed += 1,
                WorkflowStatus::Cancelled => stats.cancelled += 1,
            }

            *stats.by_priority.entry(instance.priority).or_insert(0) += 1;
            *stats.by_type.entry(instance.workflow_type).or_insert(0) += 1;
        }

        stats.avg_completion_minutes = if timed == 0 {
            0.0
        } else {
            total_minutes / timed as f64
        };

        stats
    }
}
