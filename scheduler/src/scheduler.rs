//! Scheduler event loop
//!
//! A single task owns the job table. It sleeps until the earliest fire time,
//! spawns every due job onto a `JoinSet`, reaps finished runs, and stops when
//! the shutdown channel fires. Runs still in flight at shutdown are awaited
//! before `run` returns.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use shared::{logging, process_debug, process_error, process_info, process_warn, ProcessId};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::clock::{Clock, SystemClock};
use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{JobDefinition, JobLedger, JobOutcome, JobRecord, JobState, JobTask};

/// Fires later than this are logged as late
const LATE_FIRE_WARNING: Duration = Duration::from_secs(1);

struct ScheduledJob {
    definition: JobDefinition,
    state: JobState,
}

/// Everything one spawned run needs
struct JobRun<C: Clock> {
    process_id: ProcessId,
    job_id: String,
    scheduled_for: DateTime<Utc>,
    task: Arc<dyn JobTask>,
    ledger: JobLedger,
    clock: Arc<C>,
}

pub struct Scheduler<C: Clock = SystemClock> {
    process_id: ProcessId,
    clock: Arc<C>,
    jobs: Vec<ScheduledJob>,
    ledger: JobLedger,
    in_flight: JoinSet<()>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Scheduler<SystemClock> {
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            process_id: ProcessId::Scheduler,
            clock: Arc::new(clock),
            jobs: Vec::new(),
            ledger: JobLedger::new(),
            in_flight: JoinSet::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Register a job; its first fire time is computed now
    pub fn add_job(&mut self, definition: JobDefinition) -> SchedulerResult<()> {
        if self.jobs.iter().any(|job| job.definition.id == definition.id) {
            return Err(SchedulerError::DuplicateJob { id: definition.id });
        }

        let state = match definition.trigger.first_fire(self.clock.now()) {
            Some(next_fire) => JobState::Scheduled { next_fire },
            None => JobState::Removed,
        };
        match &state {
            JobState::Scheduled { next_fire } => {
                process_info!(
                    self.process_id,
                    "📅 Job '{}' scheduled {} running {}, first fire {}",
                    definition.id,
                    definition.trigger,
                    definition.task.describe(),
                    next_fire
                );
            }
            JobState::Removed => {
                process_warn!(self.process_id, "Job '{}' ({}) has no fire times left", definition.id, definition.trigger);
            }
        }

        self.jobs.push(ScheduledJob { definition, state });
        Ok(())
    }

    pub fn add_jobs(&mut self, definitions: impl IntoIterator<Item = JobDefinition>) -> SchedulerResult<()> {
        definitions.into_iter().try_for_each(|definition| self.add_job(definition))
    }

    /// Sender that stops the loop
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn ledger(&self) -> JobLedger {
        self.ledger.clone()
    }

    pub fn job_state(&self, id: &str) -> Option<&JobState> {
        self.jobs.iter().find(|job| job.definition.id == id).map(|job| &job.state)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run until a shutdown signal arrives, then wait for running jobs
    pub async fn run(&mut self) -> SchedulerResult<()> {
        logging::log_startup(&self.process_id, &format!("scheduler with {} jobs", self.jobs.len()));
        for job in &self.jobs {
            if let JobState::Scheduled { next_fire } = job.state {
                logging::log_progress(&self.process_id, &job.definition.id, &format!("next fire {next_fire}"));
            }
        }

        loop {
            let next_due = self.next_due();
            let wait = next_due
                .map(|at| (at - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    process_info!(self.process_id, "Shutdown requested");
                    break;
                }

                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        process_error!(self.process_id, "Job task ended abnormally: {}", e);
                    }
                }

                _ = tokio::time::sleep(wait), if next_due.is_some() => {
                    self.fire_due_jobs();
                }
            }
        }

        self.drain().await;
        logging::log_shutdown(&self.process_id, "all jobs stopped");
        Ok(())
    }

    fn next_due(&self) -> Option<DateTime<Utc>> {
        self.jobs
            .iter()
            .filter_map(|job| match job.state {
                JobState::Scheduled { next_fire } => Some(next_fire),
                JobState::Removed => None,
            })
            .min()
    }

    fn fire_due_jobs(&mut self) {
        let now = self.clock.now();

        for job in &mut self.jobs {
            let JobState::Scheduled { next_fire } = job.state else {
                continue;
            };
            if next_fire > now {
                continue;
            }

            if let Ok(late) = (now - next_fire).to_std() {
                if late > LATE_FIRE_WARNING {
                    process_warn!(self.process_id, "Job '{}' fired {:?} late", job.definition.id, late);
                }
            }

            let run = JobRun {
                process_id: self.process_id.clone(),
                job_id: job.definition.id.clone(),
                scheduled_for: next_fire,
                task: job.definition.task.clone(),
                ledger: self.ledger.clone(),
                clock: self.clock.clone(),
            };
            self.in_flight.spawn(run.execute());

            job.state = match job.definition.trigger.next_fire(next_fire, now) {
                Some(next_fire) => {
                    process_debug!(self.process_id, "Job '{}' next fires at {}", job.definition.id, next_fire);
                    JobState::Scheduled { next_fire }
                }
                None => {
                    process_info!(self.process_id, "Job '{}' has no further fire times, removing", job.definition.id);
                    JobState::Removed
                }
            };
        }
    }

    async fn drain(&mut self) {
        if !self.in_flight.is_empty() {
            process_info!(self.process_id, "⏳ Waiting for {} running jobs to finish", self.in_flight.len());
        }
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                process_error!(self.process_id, "Job task ended abnormally: {}", e);
            }
        }
    }
}

impl<C: Clock> JobRun<C> {
    async fn execute(self) {
        self.ledger.start(&self.job_id).await;
        let started_at = self.clock.now();
        let timer = tokio::time::Instant::now();
        process_info!(self.process_id, "▶️ Job '{}' started (scheduled for {})", self.job_id, self.scheduled_for);

        let outcome = match AssertUnwindSafe(self.task.run()).catch_unwind().await {
            Ok(Ok(output)) => JobOutcome::Completed { output },
            Ok(Err(e)) => JobOutcome::Failed { error: e.to_string() },
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                JobOutcome::Failed {
                    error: SchedulerError::JobPanicked { message }.to_string(),
                }
            }
        };
        let duration = timer.elapsed();

        match &outcome {
            JobOutcome::Completed { output } => {
                logging::log_success(&self.process_id, &format!("Job '{}' finished in {:?}: {}", self.job_id, duration, output));
            }
            JobOutcome::Failed { error } => {
                logging::log_error(&self.process_id, &format!("Job '{}'", self.job_id), error);
            }
        }

        self.ledger
            .finish(JobRecord {
                job_id: self.job_id,
                scheduled_for: self.scheduled_for,
                started_at,
                finished_at: self.clock.now(),
                duration,
                outcome,
            })
            .await;
    }
}
