//! Wall-clock timestamps in the rig's dash format
//!
//! Both the run directory name and every MCU receipt timestamp use the same
//! dash-separated local time, `YYYY-M-D-H-Min-S-Ms`, with no zero padding
//! (e.g. `2024-3-5-7-8-9-45`). Downstream correlation scripts depend on this
//! exact shape.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike};

/// Suffix appended to the run directory name
pub const RUN_DIR_SUFFIX: &str = "-cam";

/// Format a timestamp as `YYYY-M-D-H-Min-S-Ms`
pub fn format_dash<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    let millis = (dt.nanosecond() / 1_000_000).min(999);
    format!(
        "{}-{}-{}-{}-{}-{}-{}",
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
        millis
    )
}

/// Name of the run directory for a process started at `started`
pub fn run_dir_name<Tz: TimeZone>(started: &DateTime<Tz>) -> String {
    format!("{}{}", format_dash(started), RUN_DIR_SUFFIX)
}

/// Parse a dash-format timestamp back into a local naive time
///
/// Returns `None` unless the text has exactly seven numeric fields forming a
/// valid date and time.
pub fn parse_dash(text: &str) -> Option<NaiveDateTime> {
    let fields: Vec<u32> = text
        .split('-')
        .map(|f| f.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let [year, month, day, hour, minute, second, millis] = fields[..] else {
        return None;
    };

    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?
        .and_hms_milli_opt(hour, minute, second, millis)
}
