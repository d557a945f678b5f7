//! Firing rules for scheduled jobs

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};

use crate::cron::CronSchedule;
use crate::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Fire once, as soon as the scheduler starts
    Immediate,
    /// Fire at `start`, `start + period`, ... up to and including `end`
    BoundedInterval {
        period: chrono::Duration,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Fire at every matching minute
    Cron(CronSchedule),
}

impl Trigger {
    pub fn bounded_interval(period: Duration, start: DateTime<Utc>, end: DateTime<Utc>) -> SchedulerResult<Self> {
        let period = chrono::Duration::from_std(period)
            .map_err(|_| SchedulerError::trigger(format!("period {period:?} is too large")))?;
        if period <= chrono::Duration::zero() {
            return Err(SchedulerError::trigger("period must be positive"));
        }
        if end < start {
            return Err(SchedulerError::trigger(format!("window ends at {end} before it starts at {start}")));
        }
        Ok(Self::BoundedInterval { period, start, end })
    }

    /// Interval from `now` until today's `cutoff`, or `None` once the cutoff has passed
    pub fn until_today(now: DateTime<Utc>, cutoff: NaiveTime, period: Duration) -> SchedulerResult<Option<Self>> {
        let end = now.date_naive().and_time(cutoff).and_utc();
        if now >= end {
            return Ok(None);
        }
        Self::bounded_interval(period, now, end).map(Some)
    }

    pub fn cron(expression: &str) -> SchedulerResult<Self> {
        CronSchedule::parse(expression).map(Self::Cron)
    }

    /// When a job with this trigger first fires, given the scheduler starts at `now`
    pub fn first_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Immediate => Some(now),
            Trigger::BoundedInterval { .. } => self.interval_slot_at_or_after(now),
            // A slot falling on `now` itself still counts
            Trigger::Cron(schedule) => schedule.next_after(now - chrono::Duration::seconds(1)),
        }
    }

    /// Next fire after the one scheduled for `previous`.
    ///
    /// Slots that went by while the job was late are skipped: the result is
    /// never earlier than `now`.
    pub fn next_fire(&self, previous: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Immediate => None,
            Trigger::BoundedInterval { period, .. } => self.interval_slot_at_or_after((previous + *period).max(now)),
            Trigger::Cron(schedule) => schedule.next_after(previous.max(now - chrono::Duration::seconds(1))),
        }
    }

    fn interval_slot_at_or_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Trigger::BoundedInterval { period, start, end } = self else {
            return None;
        };

        let slot = if at <= *start {
            *start
        } else {
            let period_ms = period.num_milliseconds();
            let behind_ms = (at - *start).num_milliseconds();
            let slots = (behind_ms + period_ms - 1) / period_ms;
            *start + chrono::Duration::milliseconds(slots * period_ms)
        };

        (slot <= *end).then_some(slot)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Immediate => write!(f, "immediately"),
            Trigger::BoundedInterval { period, start, end } => write!(
                f,
                "every {}m from {} until {}",
                period.num_minutes(),
                start.format("%H:%M"),
                end.format("%Y-%m-%d %H:%M UTC")
            ),
            Trigger::Cron(schedule) => write!(f, "cron '{schedule}' (UTC)"),
        }
    }
}
