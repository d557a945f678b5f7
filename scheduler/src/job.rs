//! Job definitions and the run ledger

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio::sync::RwLock;

use crate::error::SchedulerResult;
use crate::trigger::Trigger;

/// Work performed on every fire of a job
#[mockall::automock]
#[async_trait::async_trait]
pub trait JobTask: Send + Sync {
    /// Short human-readable description for logs
    fn describe(&self) -> String;

    /// Run once. The returned text is recorded as the run's output.
    async fn run(&self) -> SchedulerResult<String>;
}

/// A named trigger bound to a task
#[derive(Clone)]
pub struct JobDefinition {
    pub id: String,
    pub trigger: Trigger,
    pub task: Arc<dyn JobTask>,
}

impl JobDefinition {
    pub fn new(id: impl Into<String>, trigger: Trigger, task: Arc<dyn JobTask>) -> Self {
        Self {
            id: id.into(),
            trigger,
            task,
        }
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("task", &self.task.describe())
            .finish()
    }
}

/// Shape of the standard three-job schedule
#[derive(Debug, Clone, PartialEq)]
pub struct JobSetSettings {
    /// End of today's interval job (UTC)
    pub cutoff: NaiveTime,
    pub period: Duration,
    /// Recurring daily schedule
    pub cron: String,
}

impl Default for JobSetSettings {
    fn default() -> Self {
        Self {
            cutoff: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            period: Duration::from_secs(3600),
            cron: "0 9-17 * * *".to_string(),
        }
    }
}

impl JobSetSettings {
    /// `immediate_job`, `hourly_job_today` (only while today's cutoff is ahead)
    /// and `hourly_job`, all running `task`
    pub fn build(&self, now: DateTime<Utc>, task: Arc<dyn JobTask>) -> SchedulerResult<Vec<JobDefinition>> {
        let mut jobs = vec![JobDefinition::new("immediate_job", Trigger::Immediate, task.clone())];
        if let Some(today) = Trigger::until_today(now, self.cutoff, self.period)? {
            jobs.push(JobDefinition::new("hourly_job_today", today, task.clone()));
        }
        jobs.push(JobDefinition::new("hourly_job", Trigger::cron(&self.cron)?, task));
        Ok(jobs)
    }
}

/// Where a job is in its lifecycle.
///
/// Individual fires are tracked by the ledger: a fire counts as running from
/// `JobLedger::start` until its `JobRecord` (completed or failed) is filed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Waiting for its next fire time
    Scheduled { next_fire: DateTime<Utc> },
    /// Trigger has no further fire times
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { output: String },
    Failed { error: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// One fire of one job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: JobOutcome,
}

/// History of job runs plus the fires still running, shared between the loop and its runs
#[derive(Debug, Clone, Default)]
pub struct JobLedger {
    records: Arc<RwLock<Vec<JobRecord>>>,
    running: Arc<RwLock<HashMap<String, usize>>>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one fire of `job_id` as running
    pub async fn start(&self, job_id: &str) {
        *self.running.write().await.entry(job_id.to_string()).or_default() += 1;
    }

    /// File the outcome of a fire and take it off the running count
    pub async fn finish(&self, record: JobRecord) {
        {
            let mut running = self.running.write().await;
            if let Some(count) = running.get_mut(&record.job_id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    running.remove(&record.job_id);
                }
            }
        }
        self.records.write().await.push(record);
    }

    /// Fires of `job_id` started but not yet finished
    pub async fn running(&self, job_id: &str) -> usize {
        self.running.read().await.get(job_id).copied().unwrap_or(0)
    }

    pub async fn records(&self) -> Vec<JobRecord> {
        self.records.read().await.clone()
    }

    pub async fn records_for(&self, job_id: &str) -> Vec<JobRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| record.job_id == job_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
