// Maintenance Jobs - Retention cleanup of finished workflows

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::workflows::WorkflowStore;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub cutoff: Option<DateTime<Utc>>,
    pub workflows_purged: usize,
    pub workflows_retained: usize,
}

pub struct MaintenanceJobs;

impl MaintenanceJobs {
    /// Drop terminal workflows whose last update is older than the retention window
    pub async fn cleanup_history(
        store: &WorkflowStore,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> CleanupResult {
        let cutoff = now - Duration::days(i64::from(retention_days));
        let workflows_purged = store.purge_history_before(cutoff).await;
        let workflows_retained = store.history_count().await;

        if workflows_purged > 0 {
            info!(
                "Purged {} workflows finished before {} ({} retained)",
                workflows_purged, cutoff, workflows_retained
            );
        }

        CleanupResult {
            cutoff: Some(cutoff),
            workflows_purged,
            workflows_retained,
        }
    }
}
