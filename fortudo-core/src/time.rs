//! Time utilities: clock strings, durations and naive local instants.
//!
//! Everything here is pure. Instants are `NaiveDateTime` values on the local
//! wall clock: comparing real date-times instead of "HH:MM" strings is what
//! makes ranges that cross midnight compare correctly.

use std::sync::LazyLock;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::{PlannerError, Result};

static CLOCK_24H: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid 24h clock regex"));

static CLOCK_12H: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2}):(\d{2})\s*([ap])\.?m\.?$").expect("valid 12h clock regex")
});

/// Parse "HH:MM" into minutes since midnight (0..=1439).
pub fn minutes_of(time: &str) -> Result<u32> {
    let (h, m) = parse_hh_mm(time)?;
    Ok(h * 60 + m)
}

fn parse_hh_mm(time: &str) -> Result<(u32, u32)> {
    let time = time.trim();
    let caps = CLOCK_24H
        .captures(time)
        .ok_or_else(|| PlannerError::format(format!("invalid time '{time}', expected HH:MM")))?;

    let h: u32 = caps[1]
        .parse()
        .map_err(|_| PlannerError::format(format!("invalid hour in '{time}'")))?;
    let m: u32 = caps[2]
        .parse()
        .map_err(|_| PlannerError::format(format!("invalid minute in '{time}'")))?;

    if h > 23 || m > 59 {
        return Err(PlannerError::format(format!("time out of range: '{time}'")));
    }
    Ok((h, m))
}

/// Render minutes as "Xh Ym", dropping whichever part is zero.
pub fn format_duration(minutes: i64) -> String {
    if minutes <= 0 {
        return "0m".to_string();
    }
    let (h, m) = (minutes / 60, minutes % 60);
    match (h, m) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Same as [`format_duration`] for raw, possibly non-numeric input.
/// Garbage is tolerated: it is logged and rendered as "0m".
pub fn format_duration_str(raw: &str) -> String {
    match parse_number(raw) {
        Some(n) => format_duration(n),
        None => {
            tracing::warn!(input = raw, "non-numeric duration, rendering as 0m");
            "0m".to_string()
        }
    }
}

/// "h:mm AM" -> "HH:MM". Meridiem is case-insensitive.
pub fn to_24_hour(time12: &str) -> Result<String> {
    let time12 = time12.trim();
    let caps = CLOCK_12H
        .captures(time12)
        .ok_or_else(|| PlannerError::format(format!("invalid 12-hour time '{time12}'")))?;

    let h: u32 = caps[1]
        .parse()
        .map_err(|_| PlannerError::format(format!("invalid hour in '{time12}'")))?;
    let m: u32 = caps[2]
        .parse()
        .map_err(|_| PlannerError::format(format!("invalid minute in '{time12}'")))?;
    if !(1..=12).contains(&h) || m > 59 {
        return Err(PlannerError::format(format!("time out of range: '{time12}'")));
    }

    let pm = caps[3].eq_ignore_ascii_case("p");
    let h24 = match (h, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    Ok(format!("{h24:02}:{m:02}"))
}

/// "HH:MM" -> "h:mm AM".
pub fn to_12_hour(time24: &str) -> Result<String> {
    let (h, m) = parse_hh_mm(time24)?;
    Ok(twelve_hour(h, m))
}

fn twelve_hour(h: u32, m: u32) -> String {
    let meridiem = if h < 12 { "AM" } else { "PM" };
    let h12 = match h % 12 {
        0 => 12,
        h => h,
    };
    format!("{h12}:{m:02} {meridiem}")
}

/// Join a time of day with a calendar date (default: today on this machine).
pub fn instant_from(time: &str, date: Option<NaiveDate>) -> Result<NaiveDateTime> {
    let (h, m) = parse_hh_mm(time)?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let tod = NaiveTime::from_hms_opt(h, m, 0)
        .ok_or_else(|| PlannerError::format(format!("invalid time '{time}'")))?;
    Ok(date.and_time(tod))
}

pub fn add_minutes(instant: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    instant + Duration::minutes(minutes)
}

/// Whole minutes from `start` to `end` (negative if `end` is earlier).
pub fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_minutes()
}

/// Round up to the next 5-minute boundary. Seconds are dropped; a minute that
/// is already a multiple of 5 stays put.
pub fn round_up_to_5_minutes(now: NaiveDateTime) -> NaiveDateTime {
    let add = match now.minute() % 5 {
        0 => 0,
        r => 5 - r,
    };
    let truncated = now
        .date()
        .and_hms_opt(now.hour(), now.minute(), 0)
        .unwrap_or(now);
    truncated + Duration::minutes(add.into())
}

/// Parse a two-field duration form into total minutes.
///
/// Empty fields count as zero. Rejects non-numeric input, negatives,
/// minutes >= 60, and a zero total unless `allow_zero`.
pub fn parse_duration(hours_raw: &str, minutes_raw: &str, allow_zero: bool) -> Result<u32> {
    let hours = parse_component(hours_raw, "hours")?;
    let minutes = parse_component(minutes_raw, "minutes")?;

    if hours < 0 || minutes < 0 {
        return Err(PlannerError::validation("Duration cannot be negative"));
    }
    if minutes >= 60 {
        return Err(PlannerError::validation("Minutes must be less than 60"));
    }

    let total = hours * 60 + minutes;
    if total == 0 && !allow_zero {
        return Err(PlannerError::validation("Duration must be greater than zero"));
    }
    u32::try_from(total).map_err(|_| PlannerError::validation("Duration is too large"))
}

fn parse_component(raw: &str, label: &str) -> Result<i64> {
    if raw.trim().is_empty() {
        return Ok(0);
    }
    parse_number(raw)
        .ok_or_else(|| PlannerError::format(format!("Duration {label} must be a number")))
}

/// Integers, or floats with no fractional part ("2", " 02 ", "2.0").
fn parse_number(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Current wall-clock time in an IANA timezone, e.g. "America/Chicago".
pub fn wall_clock_now(tz: &str) -> Result<NaiveDateTime> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| PlannerError::format(format!("invalid timezone: {tz}")))?;
    Ok(Utc::now().with_timezone(&tz).naive_local())
}

/// "14:30" style rendering of an instant.
pub fn format_clock(instant: NaiveDateTime) -> String {
    instant.format("%H:%M").to_string()
}

/// "2:30 PM" style rendering of an instant.
pub fn format_instant_12h(instant: NaiveDateTime) -> String {
    twelve_hour(instant.hour(), instant.minute())
}
