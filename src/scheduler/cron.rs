// pgs3/src/scheduler/cron.rs
use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveDateTime,
    TimeZone, Timelike,
};
use std::fmt;

use crate::errors::{AppError, Result};

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// How far ahead `next_after` searches. Covers the longest gap a valid
/// expression can have (Feb 29 across a skipped leap year).
const SEARCH_HORIZON_DAYS: i64 = 366 * 9;

/// Standard 5-field cron expression: minute, hour, day-of-month, month,
/// day-of-week.
///
/// Each field accepts `*`, single values, `a-b` ranges, `/n` steps and comma
/// lists. Months and weekdays also accept three-letter names, and `7` is
/// Sunday. When both day fields are restricted a day matches if either does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_unrestricted: bool,
    dow_unrestricted: bool,
    raw: String,
}

impl CronSchedule {
    /// Parse a crontab expression or one of the `@hourly`, `@daily`,
    /// `@midnight`, `@weekly`, `@monthly`, `@yearly`, `@annually` shortcuts.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let expanded = match trimmed.to_ascii_lowercase().as_str() {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            _ => trimmed,
        };

        let invalid = |reason: String| {
            AppError::config(format!("schedule is invalid: '{trimmed}': {reason}"))
        };

        let parts: Vec<&str> = expanded.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(invalid(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), got {}",
                parts.len()
            )));
        }

        let minutes = parse_field(parts[0], 0, 59, &[]).map_err(invalid)?;
        let hours = parse_field(parts[1], 0, 23, &[]).map_err(invalid)?;
        let days_of_month = parse_field(parts[2], 1, 31, &[]).map_err(invalid)?;
        let months = parse_field(parts[3], 1, 12, MONTH_NAMES).map_err(invalid)?;
        let mut days_of_week = parse_field(parts[4], 0, 7, WEEKDAY_NAMES).map_err(invalid)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_unrestricted: parts[2].starts_with('*'),
            dow_unrestricted: parts[4].starts_with('*'),
            raw: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// First firing time strictly after `after`, evaluated in `after`'s
    /// timezone. `None` when the expression never fires (e.g. `0 0 30 2 *`).
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut candidate = after
            .naive_local()
            .with_second(0)?
            .with_nanosecond(0)?
            + ChronoDuration::minutes(1);
        let horizon = candidate + ChronoDuration::days(SEARCH_HORIZON_DAYS);

        while candidate < horizon {
            if !has_bit(self.months, candidate.month()) {
                candidate = start_of_next_month(candidate)?;
                continue;
            }
            if !self.day_matches(candidate.date()) {
                candidate = candidate.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !has_bit(self.hours, candidate.hour()) {
                candidate = candidate.date().and_hms_opt(candidate.hour(), 0, 0)?
                    + ChronoDuration::hours(1);
                continue;
            }
            if !has_bit(self.minutes, candidate.minute()) {
                candidate += ChronoDuration::minutes(1);
                continue;
            }

            match tz.from_local_datetime(&candidate) {
                LocalResult::Single(at) if at > *after => return Some(at),
                LocalResult::Ambiguous(earliest, latest) => {
                    if earliest > *after {
                        return Some(earliest);
                    }
                    if latest > *after {
                        return Some(latest);
                    }
                }
                // Skipped by a DST gap, or not after `after`.
                _ => {}
            }
            candidate += ChronoDuration::minutes(1);
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = has_bit(self.days_of_month, date.day());
        let dow = has_bit(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.dom_unrestricted || self.dow_unrestricted {
            dom && dow
        } else {
            dom || dow
        }
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_bit(set: u64, value: u32) -> bool {
    set & (1u64 << value) != 0
}

fn start_of_next_month(at: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

/// Parse one cron field into a bitset of allowed values.
fn parse_field(
    raw: &str,
    min: u32,
    max: u32,
    names: &[&str],
) -> std::result::Result<u64, String> {
    let mut set = 0u64;
    for part in raw.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{step}' in '{raw}'"))?;
                if step == 0 {
                    return Err(format!("step must be positive in '{raw}'"));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (low, high) = if range == "*" {
            (min, max)
        } else if let Some((low, high)) = range.split_once('-') {
            (
                parse_value(low, min, names, raw)?,
                parse_value(high, min, names, raw)?,
            )
        } else {
            let value = parse_value(range, min, names, raw)?;
            // "5/15" means "from 5 to the end, every 15"
            if step.is_some() { (value, max) } else { (value, value) }
        };

        if low < min || high > max {
            return Err(format!("value out of range ({min}-{max}) in '{raw}'"));
        }
        if low > high {
            return Err(format!("range start is after range end in '{raw}'"));
        }

        for value in (low..=high).step_by(step.unwrap_or(1) as usize) {
            set |= 1u64 << value;
        }
    }
    Ok(set)
}

fn parse_value(token: &str, min: u32, names: &[&str], field: &str) -> std::result::Result<u32, String> {
    if let Ok(value) = token.parse::<u32>() {
        return Ok(value);
    }
    let lower = token.to_ascii_lowercase();
    names
        .iter()
        .position(|name| *name == lower)
        .map(|index| index as u32 + min)
        .ok_or_else(|| format!("invalid value '{token}' in '{field}'"))
}
