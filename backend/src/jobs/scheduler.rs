// Job Scheduler - Central scheduler for the engine's background jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler as TokioScheduler, JobSchedulerError};
use tracing::{info, warn};
use uuid::Uuid;

use super::{MaintenanceJobs, TimeoutMonitorJob};
use crate::config::JobConfig;
use crate::workflows::WorkflowEngine;

pub const TIMEOUT_MONITOR: &str = "timeout_monitor";
pub const HISTORY_CLEANUP: &str = "history_cleanup";

const MAX_EXECUTION_LOGS: usize = 100;

/// Fixed repeat period. Cron step fields only divide their own unit, so an
/// interval like 90 minutes cannot be written as `*/90`.
fn every_minutes(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes.max(1)) * 60)
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(#[from] JobSchedulerError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionLog {
    pub id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub items_processed: usize,
    pub errors: Vec<String>,
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    /// Ran to the end but some workflows could not be handled
    PartialFailure,
}

type ExecutionLogs = Arc<RwLock<Vec<JobExecutionLog>>>;

pub struct JobScheduler {
    scheduler: TokioScheduler,
    engine: Arc<WorkflowEngine>,
    config: JobConfig,
    execution_logs: ExecutionLogs,
}

impl JobScheduler {
    pub async fn new(engine: Arc<WorkflowEngine>, config: JobConfig) -> JobResult<Self> {
        if config.timeout_check_interval_minutes == 0 || config.history_cleanup_interval_hours == 0 {
            return Err(JobError::ConfigError(
                "job intervals must be at least 1".to_string(),
            ));
        }

        let scheduler = TokioScheduler::new().await?;

        Ok(Self {
            scheduler,
            engine,
            config,
            execution_logs: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        info!("Starting background job scheduler");

        self.schedule_timeout_monitor().await?;
        self.schedule_history_cleanup().await?;

        self.scheduler.start().await?;

        info!("Background job scheduler started successfully");
        Ok(())
    }

    pub async fn shutdown(&self) -> JobResult<()> {
        info!("Shutting down background job scheduler");
        let mut scheduler = self.scheduler.clone();
        scheduler.shutdown().await?;
        Ok(())
    }

    async fn schedule_timeout_monitor(&self) -> JobResult<()> {
        let interval = self.config.timeout_check_interval_minutes;

        let engine = self.engine.clone();
        let config = self.config.clone();
        let logs = self.execution_logs.clone();

        let job = Job::new_repeated_async(every_minutes(interval), move |_uuid, _lock| {
            let engine = engine.clone();
            let config = config.clone();
            let logs = logs.clone();

            Box::pin(async move {
                run_timeout_monitor(engine, &config, &logs).await;
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled timeout monitor to run every {} minutes", interval);

        Ok(())
    }

    async fn schedule_history_cleanup(&self) -> JobResult<()> {
        let interval = self.config.history_cleanup_interval_hours;

        let engine = self.engine.clone();
        let retention_days = self.config.history_retention_days;
        let logs = self.execution_logs.clone();

        let period = every_minutes(interval.saturating_mul(60));
        let job = Job::new_repeated_async(period, move |_uuid, _lock| {
            let engine = engine.clone();
            let logs = logs.clone();

            Box::pin(async move {
                run_history_cleanup(&engine, retention_days, &logs).await;
            })
        })?;

        self.scheduler.add(job).await?;
        info!("Scheduled history cleanup every {} hours", interval);

        Ok(())
    }

    pub async fn get_execution_logs(&self) -> Vec<JobExecutionLog> {
        self.execution_logs.read().await.clone()
    }

    /// Run a job immediately, outside its schedule
    pub async fn run_job_now(&self, job_name: &str) -> JobResult<JobExecutionLog> {
        match job_name {
            TIMEOUT_MONITOR => {
                Ok(run_timeout_monitor(self.engine.clone(), &self.config, &self.execution_logs).await)
            }
            HISTORY_CLEANUP => Ok(run_history_cleanup(
                &self.engine,
                self.config.history_retention_days,
                &self.execution_logs,
            )
            .await),
            _ => Err(JobError::ConfigError(format!("Unknown job: {}", job_name))),
        }
    }
}

async fn run_timeout_monitor(
    engine: Arc<WorkflowEngine>,
    config: &JobConfig,
    logs: &ExecutionLogs,
) -> JobExecutionLog {
    let started_at = Utc::now();
    info!("Running timeout monitor job");

    let report = TimeoutMonitorJob::new(engine, config).run().await;

    info!(
        "Timeout monitor completed: {} workflows checked, {} warnings, {} escalations",
        report.workflows_checked, report.warnings_sent, report.escalations_triggered
    );

    let status = if report.errors.is_empty() {
        JobStatus::Completed
    } else {
        JobStatus::PartialFailure
    };
    let log = finish_log("Timeout Monitor", started_at, status, report.workflows_checked, report.errors);
    record(logs, log.clone()).await;
    log
}

async fn run_history_cleanup(
    engine: &WorkflowEngine,
    retention_days: u32,
    logs: &ExecutionLogs,
) -> JobExecutionLog {
    let started_at = Utc::now();
    info!("Running history cleanup job");

    let result = MaintenanceJobs::cleanup_history(engine.store(), retention_days, engine.now()).await;

    let log = finish_log(
        "History Cleanup",
        started_at,
        JobStatus::Completed,
        result.workflows_purged,
        Vec::new(),
    );
    record(logs, log.clone()).await;
    log
}

fn finish_log(
    job_name: &str,
    started_at: DateTime<Utc>,
    status: JobStatus,
    items_processed: usize,
    errors: Vec<String>,
) -> JobExecutionLog {
    let completed_at = Utc::now();
    if status != JobStatus::Completed {
        warn!("{} finished with errors: {:?}", job_name, errors);
    }

    JobExecutionLog {
        id: Uuid::new_v4(),
        job_name: job_name.to_string(),
        started_at,
        completed_at: Some(completed_at),
        status,
        items_processed,
        errors,
        duration_ms: Some((completed_at - started_at).num_milliseconds()),
    }
}

async fn record(logs: &ExecutionLogs, log: JobExecutionLog) {
    let mut logs = logs.write().await;
    logs.push(log);
    // Keep only the most recent runs
    if logs.len() > MAX_EXECUTION_LOGS {
        let excess = logs.len() - MAX_EXECUTION_LOGS;
        logs.drain(..excess);
    }
}
