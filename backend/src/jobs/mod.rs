// Background Jobs
//
// Scheduled jobs that drive the workflow engine's time-based behavior.
// Jobs are scheduled using tokio-cron-scheduler; the engine itself never owns a timer.

pub mod maintenance;
pub mod scheduler;
pub mod timeout_monitor;

pub use maintenance::{CleanupResult, MaintenanceJobs};
pub use scheduler::{
    HISTORY_CLEANUP, JobError, JobExecutionLog, JobResult, JobScheduler, JobStatus, TIMEOUT_MONITOR,
};
pub use timeout_monitor::{TimeoutMonitorJob, TimeoutSweepReport};
