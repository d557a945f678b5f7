//! Recurring job scheduler for synthetic loyalty traffic
//!
//! Drives customer registration (as an external command) or transaction
//! bursts (in-process) on immediate, bounded-interval and cron triggers, and
//! shuts down cooperatively: no new fires after a signal, running jobs finish.

pub mod clock;
pub mod cron;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod services;
pub mod trigger;

// Re-export commonly used types
pub use clock::{Clock, SystemClock, TokioClock};
pub use cron::CronSchedule;
pub use error::{SchedulerError, SchedulerResult};
pub use job::{JobDefinition, JobLedger, JobOutcome, JobRecord, JobSetSettings, JobState, JobTask};
pub use scheduler::Scheduler;
pub use trigger::Trigger;
