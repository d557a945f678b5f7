//! Five-field cron expressions evaluated in UTC
//!
//! `minute hour day-of-month month day-of-week`, each field accepting `*`,
//! numbers, ranges `a-b`, steps `*/n`, `a/n` and `a-b/n`, and comma lists.
//! Day-of-week runs 0-6 from Sunday; 7 is also Sunday. When both day fields
//! are restricted, a day matches if either field matches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::{SchedulerError, SchedulerResult};

/// Search horizon for `next_after`; covers every leap-day schedule
const MAX_SEARCH_DAYS: u32 = 366 * 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields[..] else {
            return Err(SchedulerError::cron(
                expression,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        };

        let field = |raw: &str, name: &str, min: u32, max: u32| {
            parse_field(raw, min, max).map_err(|reason| SchedulerError::cron(expression, format!("{name}: {reason}")))
        };

        let mut days_of_week = field(dow, "day-of-week", 0, 7)?;
        // 7 is Sunday
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: field(minute, "minute", 0, 59)?,
            hours: field(hour, "hour", 0, 23)?,
            days_of_month: field(dom, "day-of-month", 1, 31)?,
            months: field(month, "month", 1, 12)?,
            days_of_week,
            dom_restricted: !dom.starts_with('*'),
            dow_restricted: !dow.starts_with('*'),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Earliest matching minute strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let mut date = start.date_naive();

        for day in 0..MAX_SEARCH_DAYS {
            if self.matches_date(date) {
                let (first_hour, first_minute) = if day == 0 { (start.hour(), start.minute()) } else { (0, 0) };
                if let Some((hour, minute)) = self.first_time_from(first_hour, first_minute) {
                    let naive = date.and_hms_opt(hour, minute, 0)?;
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Does `at` fall on a matching minute
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.matches_date(at.date_naive()) && has(self.hours, at.hour()) && has(self.minutes, at.minute())
    }

    fn matches_date(&self, date: NaiveDate) -> bool {
        if !has(self.months, date.month()) {
            return false;
        }
        let dom = has(self.days_of_month, date.day());
        let dow = has(self.days_of_week, date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    fn first_time_from(&self, first_hour: u32, first_minute: u32) -> Option<(u32, u32)> {
        (first_hour..24).filter(|h| has(self.hours, *h)).find_map(|hour| {
            let from = if hour == first_hour { first_minute } else { 0 };
            (from..60).find(|m| has(self.minutes, *m)).map(|minute| (hour, minute))
        })
    }
}

impl FromStr for CronSchedule {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn has(mask: u64, value: u32) -> bool {
    mask & (1 << value) != 0
}

/// Bit set of the values a field selects
fn parse_field(field: &str, min: u32, max: u32) -> Result<u64, String> {
    let mut mask = 0u64;
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| format!("invalid step '{step}'"))?;
                if step == 0 {
                    return Err("step must be at least 1".to_string());
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (low, high) = if range == "*" {
            (min, max)
        } else if let Some((low, high)) = range.split_once('-') {
            (number(low, min, max)?, number(high, min, max)?)
        } else {
            let value = number(range, min, max)?;
            // `a/n` runs from a to the end of the field
            (value, if step.is_some() { max } else { value })
        };
        if low > high {
            return Err(format!("range {low}-{high} is reversed"));
        }

        for value in (low..=high).step_by(step.unwrap_or(1) as usize) {
            mask |= 1 << value;
        }
    }
    Ok(mask)
}

fn number(raw: &str, min: u32, max: u32) -> Result<u32, String> {
    let value: u32 = raw.parse().map_err(|_| format!("invalid value '{raw}'"))?;
    if value < min || value > max {
        return Err(format!("{value} is outside {min}-{max}"));
    }
    Ok(value)
}
