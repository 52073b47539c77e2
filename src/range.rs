use crate::error::{DiaryError, Result};
use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named or explicit scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateMode {
    Today,
    Weekly,
    Monthly,
    Custom(NaiveDate),
}

impl FromStr for DateMode {
    type Err = DiaryError;

    fn from_str(input: &str) -> Result<Self> {
        let lower = input.trim().to_ascii_lowercase();
        match lower.as_str() {
            "today" => Ok(DateMode::Today),
            "weekly" => Ok(DateMode::Weekly),
            "monthly" => Ok(DateMode::Monthly),
            other => match other.strip_prefix("custom:") {
                Some(date) => parse_day(date.trim()).map(DateMode::Custom),
                None => Err(DiaryError::InvalidDateFormat(format!(
                    "unknown mode '{input}', expected today, weekly, monthly or custom:YYYY-MM-DD"
                ))),
            },
        }
    }
}

impl fmt::Display for DateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateMode::Today => f.write_str("today"),
            DateMode::Weekly => f.write_str("weekly"),
            DateMode::Monthly => f.write_str("monthly"),
            DateMode::Custom(day) => write!(f, "custom:{}", day.format("%Y-%m-%d")),
        }
    }
}

pub fn parse_day(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| DiaryError::InvalidDateFormat(format!("'{input}' is not a YYYY-MM-DD date")))
}

/// Half-open interval `[start, end)` in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl DateRange {
    pub fn new(start: DateTime<Local>, end: DateTime<Local>) -> Result<Self> {
        if start > end {
            return Err(DiaryError::InvalidDateFormat(format!(
                "Invalid range: start ({start}) is after end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn resolve(mode: DateMode, until: Option<NaiveDate>) -> Result<Self> {
        Self::resolve_at(mode, until, Local::now())
    }

    /// Resolves `mode` relative to `now`. `until` is an inclusive calendar day.
    pub fn resolve_at(
        mode: DateMode,
        until: Option<NaiveDate>,
        now: DateTime<Local>,
    ) -> Result<Self> {
        let today = now.date_naive();
        let start_day = match mode {
            DateMode::Today => today,
            DateMode::Weekly => today.checked_sub_days(Days::new(7)).ok_or_else(|| {
                DiaryError::InvalidDateFormat(format!("cannot go back a week from {today}"))
            })?,
            DateMode::Monthly => today.with_day(1).unwrap_or(today),
            DateMode::Custom(day) => day,
        };

        let start = local_midnight(start_day)?;
        if start > now {
            return Err(DiaryError::InvalidDateFormat(format!(
                "start date {start_day} is in the future"
            )));
        }

        let end = match until {
            None => now,
            Some(day) if day < start_day => {
                return Err(DiaryError::InvalidDateFormat(format!(
                    "end date {day} is before start date {start_day}"
                )));
            }
            Some(day) => {
                let next = day.checked_add_days(Days::new(1)).ok_or_else(|| {
                    DiaryError::InvalidDateFormat(format!("end date {day} is out of range"))
                })?;
                local_midnight(next)?.min(now)
            }
        };

        Self::new(start, end)
    }

    pub fn contains(&self, timestamp: &DateTime<Local>) -> bool {
        self.start <= *timestamp && *timestamp < self.end
    }
}

fn local_midnight(day: NaiveDate) -> Result<DateTime<Local>> {
    // DST transitions can skip 00:00 in some zones
    (0..3)
        .filter_map(|hour| day.and_hms_opt(hour, 0, 0))
        .find_map(|naive| Local.from_local_datetime(&naive).earliest())
        .ok_or_else(|| DiaryError::InvalidDateFormat(format!("{day} has no valid local midnight")))
}
