//! Recurrence rules (RFC 5545 RRULE subset)
//!
//! Supported parts: `FREQ` (DAILY, WEEKLY, MONTHLY), `INTERVAL`, `COUNT`,
//! `UNTIL` and `BYDAY` (WEEKLY only, plain weekday codes). Everything is
//! evaluated in UTC.
//!
//! DTSTART is always the first occurrence and counts toward `COUNT`, even
//! when it does not fall on a listed `BYDAY` weekday.
//!
//! ```
//! use stagehand_common::recurrence::RecurrenceRule;
//! use chrono::{TimeZone, Utc};
//!
//! let rule: RecurrenceRule = "FREQ=WEEKLY;BYDAY=MO,WE;COUNT=4".parse().unwrap();
//! let start = Utc.with_ymd_and_hms(2025, 3, 3, 19, 0, 0).unwrap(); // Monday
//! let starts: Vec<_> = rule.starts(start).collect();
//! assert_eq!(starts.len(), 4);
//! assert_eq!(starts[1], Utc.with_ymd_and_hms(2025, 3, 5, 19, 0, 0).unwrap());
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Hard cap on occurrences returned by a single expansion
pub const MAX_OCCURRENCES: usize = 1000;

/// Largest accepted `INTERVAL`
pub const MAX_INTERVAL: u32 = 1000;

/// Upper bound on generated periods; keeps sparse rules from spinning forever
const MAX_PERIODS: i64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
        }
    }
}

/// Parsed recurrence rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    /// Sorted Monday-first, no duplicates
    pub by_day: Vec<Weekday>,
}

/// One concrete `[start, end)` instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RecurrenceRule {
    /// Parse rule text, with or without the `RRULE:` prefix
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let body = match trimmed.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &trimmed[6..],
            _ => trimmed,
        };

        if body.is_empty() {
            return Err(invalid("empty rule"));
        }

        let mut freq = None;
        let mut interval = None;
        let mut count = None;
        let mut until = None;
        let mut by_day: Option<Vec<Weekday>> = None;

        for part in body.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(&format!("malformed part '{}'", part)))?;
            let key = key.trim().to_ascii_uppercase();
            let value = value.trim();

            match key.as_str() {
                "FREQ" => set_once(&mut freq, parse_freq(value)?, "FREQ")?,
                "INTERVAL" => {
                    let n: u32 = value
                        .parse()
                        .map_err(|_| invalid(&format!("INTERVAL '{}' is not a number", value)))?;
                    if n == 0 || n > MAX_INTERVAL {
                        return Err(invalid(&format!(
                            "INTERVAL must be between 1 and {}",
                            MAX_INTERVAL
                        )));
                    }
                    set_once(&mut interval, n, "INTERVAL")?;
                }
                "COUNT" => {
                    let n: u32 = value
                        .parse()
                        .map_err(|_| invalid(&format!("COUNT '{}' is not a number", value)))?;
                    if n == 0 || n as usize > MAX_OCCURRENCES {
                        return Err(invalid(&format!(
                            "COUNT must be between 1 and {}",
                            MAX_OCCURRENCES
                        )));
                    }
                    set_once(&mut count, n, "COUNT")?;
                }
                "UNTIL" => set_once(&mut until, parse_until(value)?, "UNTIL")?,
                "BYDAY" => set_once(&mut by_day, parse_by_day(value)?, "BYDAY")?,
                other => return Err(invalid(&format!("unsupported part '{}'", other))),
            }
        }

        let freq = freq.ok_or_else(|| invalid("FREQ is required"))?;

        if count.is_some() && until.is_some() {
            return Err(invalid("COUNT and UNTIL are mutually exclusive"));
        }

        let by_day = by_day.unwrap_or_default();
        if !by_day.is_empty() && freq != Frequency::Weekly {
            return Err(invalid("BYDAY is only supported with FREQ=WEEKLY"));
        }

        Ok(Self {
            freq,
            interval: interval.unwrap_or(1),
            count,
            until,
            by_day,
        })
    }

    /// True when the rule ends on its own (COUNT or UNTIL)
    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    /// Occurrence start times in chronological order, beginning with `dtstart`
    pub fn starts(&self, dtstart: DateTime<Utc>) -> Starts<'_> {
        Starts {
            rule: self,
            dtstart,
            time: dtstart.time(),
            period: 0,
            pending: Vec::new(),
            emitted: 0,
            last: None,
            done: false,
        }
    }

    /// Occurrences intersecting `[window_start, window_end)`
    ///
    /// Returns at most `limit` occurrences (itself capped at
    /// [`MAX_OCCURRENCES`]).
    pub fn expand(
        &self,
        dtstart: DateTime<Utc>,
        duration: Duration,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        limit: usize,
    ) -> Vec<Occurrence> {
        let limit = limit.min(MAX_OCCURRENCES);
        let mut out = Vec::new();

        for start in self.starts(dtstart) {
            if start >= window_end || out.len() >= limit {
                break;
            }
            let Some(end) = start.checked_add_signed(duration) else {
                break;
            };
            if end > window_start {
                out.push(Occurrence { start, end });
            }
        }

        out
    }

    /// Start of the last occurrence before `horizon`
    pub fn last_start_before(
        &self,
        dtstart: DateTime<Utc>,
        horizon: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.starts(dtstart)
            .take_while(|s| *s < horizon)
            .last()
            .unwrap_or(dtstart)
    }

    /// Candidates of one period; None once the period falls off chrono's calendar
    fn period_candidates(
        &self,
        dtstart: DateTime<Utc>,
        time: NaiveTime,
        period: i64,
    ) -> Option<Vec<DateTime<Utc>>> {
        let step = period.checked_mul(i64::from(self.interval))?;
        let date = dtstart.date_naive();

        match self.freq {
            Frequency::Daily => Some(vec![at(shift_days(date, step)?, time)]),
            Frequency::Weekly if self.by_day.is_empty() => {
                Some(vec![at(shift_days(date, step.checked_mul(7)?)?, time)])
            }
            Frequency::Weekly => {
                let monday =
                    shift_days(date, -i64::from(date.weekday().num_days_from_monday()))?;
                let week_start = shift_days(monday, step.checked_mul(7)?)?;
                self.by_day
                    .iter()
                    .map(|wd| {
                        shift_days(week_start, i64::from(wd.num_days_from_monday()))
                            .map(|d| at(d, time))
                    })
                    .collect()
            }
            Frequency::Monthly => {
                let months = (i64::from(date.year()) * 12 + i64::from(date.month0()))
                    .checked_add(step)?;
                let year = i32::try_from(months.div_euclid(12)).ok()?;
                if year > NaiveDate::MAX.year() {
                    return None;
                }
                let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
                // Months without this day (e.g. the 31st) are skipped
                Some(
                    NaiveDate::from_ymd_opt(year, month, date.day())
                        .map(|d| vec![at(d, time)])
                        .unwrap_or_default(),
                )
            }
        }
    }
}

/// Iterator over occurrence starts, see [`RecurrenceRule::starts`]
pub struct Starts<'a> {
    rule: &'a RecurrenceRule,
    dtstart: DateTime<Utc>,
    time: NaiveTime,
    period: i64,
    /// Candidates of the current period, reversed so `pop` yields the earliest
    pending: Vec<DateTime<Utc>>,
    emitted: u32,
    last: Option<DateTime<Utc>>,
    done: bool,
}

impl Iterator for Starts<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(count) = self.rule.count {
                if self.emitted >= count {
                    self.done = true;
                    return None;
                }
            }

            let candidate = match self.last {
                None => self.dtstart,
                Some(_) => match self.pending.pop() {
                    Some(c) => c,
                    None => {
                        if self.period >= MAX_PERIODS {
                            self.done = true;
                            return None;
                        }
                        let Some(mut next) =
                            self.rule
                                .period_candidates(self.dtstart, self.time, self.period)
                        else {
                            self.done = true;
                            return None;
                        };
                        self.period += 1;
                        next.reverse();
                        self.pending = next;
                        continue;
                    }
                },
            };

            if let Some(last) = self.last {
                if candidate <= last {
                    continue;
                }
            }

            if let Some(until) = self.rule.until {
                if candidate > until {
                    self.done = true;
                    return None;
                }
            }

            self.last = Some(candidate);
            self.emitted += 1;
            return Some(candidate);
        }
    }
}

impl FromStr for RecurrenceRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.freq.as_str())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.by_day.is_empty() {
            let days: Vec<&str> = self.by_day.iter().map(|d| weekday_code(*d)).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        if let Some(count) = self.count {
            write!(f, ";COUNT={}", count)?;
        }
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%SZ"))?;
        }
        Ok(())
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

fn invalid(msg: &str) -> Error {
    Error::InvalidInput(format!("Invalid recurrence rule: {}", msg))
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<()> {
    if slot.is_some() {
        return Err(invalid(&format!("{} given more than once", name)));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_freq(value: &str) -> Result<Frequency> {
    match value.to_ascii_uppercase().as_str() {
        "DAILY" => Ok(Frequency::Daily),
        "WEEKLY" => Ok(Frequency::Weekly),
        "MONTHLY" => Ok(Frequency::Monthly),
        other => Err(invalid(&format!("unsupported FREQ '{}'", other))),
    }
}

/// `YYYYMMDD` (inclusive through end of day) or `YYYYMMDDTHHMMSSZ`
fn parse_until(value: &str) -> Result<DateTime<Utc>> {
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|_| invalid(&format!("UNTIL '{}' is not a date", value)))?;
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        return Ok(at(date, end_of_day));
    }

    let stripped = value
        .strip_suffix('Z')
        .ok_or_else(|| invalid("UNTIL date-time must be UTC (end with Z)"))?;
    chrono::NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S")
        .map(|dt| dt.and_utc())
        .map_err(|_| invalid(&format!("UNTIL '{}' is not a date-time", value)))
}

fn parse_by_day(value: &str) -> Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for code in value.split(',') {
        let day = match code.trim().to_ascii_uppercase().as_str() {
            "MO" => Weekday::Mon,
            "TU" => Weekday::Tue,
            "WE" => Weekday::Wed,
            "TH" => Weekday::Thu,
            "FR" => Weekday::Fri,
            "SA" => Weekday::Sat,
            "SU" => Weekday::Sun,
            other => return Err(invalid(&format!("unsupported BYDAY '{}'", other))),
        };
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err(invalid("BYDAY is empty"));
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    Ok(days)
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}
