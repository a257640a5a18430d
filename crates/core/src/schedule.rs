//! Human-readable schedule descriptions and their canonical cron form.
//!
//! [`Recurrence`] is the vocabulary callers use to describe when a job
//! should run; [`Recurrence::to_cron`] produces the 5-field expression
//! (minute, hour, day-of-month, month, day-of-week) and [`describe`]
//! goes the other way for display. Custom expressions pass through
//! unvalidated, matching the behavior jobs were created with
//! historically.

use chrono::Weekday;

use crate::error::CoreError;

/// Lowercase weekday names, Monday-first, matching the stored
/// `recurring_days` CSV and cron day numbers 1-7.
pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// A recurrence rule in caller-facing terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    /// Every day at `time` (`HH:MM`).
    Daily { time: String },
    /// On each listed weekday (1 = Monday .. 7 = Sunday) at `time`.
    Weekly { time: String, days: Vec<u8> },
    /// On day-of-month `day` (1..=31) at `time`.
    Monthly { time: String, day: u8 },
    /// Every `minutes` minutes.
    Interval { minutes: u32 },
    /// A raw cron expression, passed through untouched.
    Custom { expr: String },
}

impl Recurrence {
    /// Render the canonical 5-field cron expression.
    pub fn to_cron(&self) -> Result<String, CoreError> {
        match self {
            Self::Daily { time } => {
                let (hour, minute) = parse_hhmm(time)?;
                Ok(format!("{minute} {hour} * * *"))
            }
            Self::Weekly { time, days } => {
                let (hour, minute) = parse_hhmm(time)?;
                if days.is_empty() {
                    return Err(CoreError::Validation(
                        "Weekly schedule requires at least one day".into(),
                    ));
                }
                if let Some(bad) = days.iter().find(|d| **d < 1 || **d > 7) {
                    return Err(CoreError::Validation(format!(
                        "Weekday out of range 1-7: {bad}"
                    )));
                }
                let mut sorted = days.clone();
                sorted.sort_unstable();
                sorted.dedup();
                let list = sorted
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(format!("{minute} {hour} * * {list}"))
            }
            Self::Monthly { time, day } => {
                let (hour, minute) = parse_hhmm(time)?;
                if *day < 1 || *day > 31 {
                    return Err(CoreError::Validation(format!(
                        "Day of month out of range 1-31: {day}"
                    )));
                }
                Ok(format!("{minute} {hour} {day} * *"))
            }
            Self::Interval { minutes } => {
                if *minutes == 0 {
                    return Err(CoreError::Validation(
                        "Interval must be at least one minute".into(),
                    ));
                }
                Ok(format!("*/{minutes} * * * *"))
            }
            // Unvalidated pass-through.
            Self::Custom { expr } => Ok(expr.clone()),
        }
    }
}

/// Summarize a cron expression in plain words.
///
/// Recognizes the four shapes [`Recurrence::to_cron`] emits; anything
/// else is reported as a custom expression.
pub fn describe(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return format!("Custom schedule: {expr}");
    }
    let (minute, hour, dom, month, dow) =
        (fields[0], fields[1], fields[2], fields[3], fields[4]);

    if let Some(step) = minute.strip_prefix("*/") {
        if [hour, dom, month, dow].iter().all(|f| *f == "*") {
            if let Ok(n) = step.parse::<u32>() {
                return format!("Every {n} minutes");
            }
        }
    }

    let (m, h) = match (minute.parse::<u8>(), hour.parse::<u8>()) {
        (Ok(m), Ok(h)) if m < 60 && h < 24 => (m, h),
        _ => return format!("Custom schedule: {expr}"),
    };

    if month != "*" {
        return format!("Custom schedule: {expr}");
    }

    match (dom, dow) {
        ("*", "*") => format!("Every day at {h:02}:{m:02}"),
        ("*", days) => {
            let names: Vec<String> = days
                .split(',')
                .filter_map(|d| d.parse::<u8>().ok())
                .filter_map(day_number_to_name)
                .map(capitalize_static)
                .collect();
            if names.is_empty() {
                return format!("Custom schedule: {expr}");
            }
            format!("Every {} at {h:02}:{m:02}", names.join(", "))
        }
        (day, "*") => match day.parse::<u8>() {
            Ok(d) if (1..=31).contains(&d) => {
                format!("Monthly on day {d} at {h:02}:{m:02}")
            }
            _ => format!("Custom schedule: {expr}"),
        },
        _ => format!("Custom schedule: {expr}"),
    }
}

/// Parse an `HH:MM` string into `(hour, minute)`.
pub fn parse_hhmm(time: &str) -> Result<(u8, u8), CoreError> {
    let invalid = || CoreError::Validation(format!("Invalid HH:MM time: {time}"));
    let (h, m) = time.split_once(':').ok_or_else(invalid)?;
    let hour: u8 = h.parse().map_err(|_| invalid())?;
    let minute: u8 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Lowercase name for cron day numbers 1-7 (Monday-first).
pub fn day_number_to_name(n: u8) -> Option<&'static str> {
    if n == 0 {
        return None;
    }
    WEEKDAYS.get(n as usize - 1).copied()
}

/// Cron day number 1-7 (Monday-first) for a weekday name.
pub fn day_name_to_number(name: &str) -> Option<u8> {
    WEEKDAYS
        .iter()
        .position(|d| d.eq_ignore_ascii_case(name))
        .map(|i| (i + 1) as u8)
}

/// Lowercase name for a chrono weekday, matching [`WEEKDAYS`].
pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAYS[day.num_days_from_monday() as usize]
}

/// Capitalized weekday name as the host service expects in `Days`
/// (e.g. `"monday"` -> `"Monday"`).
pub fn host_day_name(name: &str) -> Option<&'static str> {
    const HOST_DAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];
    WEEKDAYS
        .iter()
        .position(|d| d.eq_ignore_ascii_case(name))
        .map(|i| HOST_DAYS[i])
}

fn capitalize_static(name: &'static str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
