// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calendar schedule evaluation.
//!
//! The rest of the daemon treats this as a black box that yields the next
//! fire time for a `StartCalendarInterval`. Matching is minute-granular in
//! local time, launchd-style: unset fields are wildcards, `Weekday` accepts
//! 0–7 with both 0 and 7 meaning Sunday.

use std::time::Duration;

use chrono::{DateTime, Datelike, Local, Timelike};
use jobd_core::CalendarInterval;

/// Scan horizon: one leap year of minutes is enough for any satisfiable
/// Month/Day/Weekday combination.
const SCAN_LIMIT_MINUTES: u32 = 366 * 24 * 60;

/// Next local time strictly after `after` matching the interval.
///
/// Returns `None` for unsatisfiable intervals (e.g. `Day: 31, Month: 2`).
pub fn next_fire_time(
    interval: &CalendarInterval,
    after: DateTime<Local>,
) -> Option<DateTime<Local>> {
    let mut t = (after + chrono::Duration::minutes(1))
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))?;

    for _ in 0..SCAN_LIMIT_MINUTES {
        if matches(interval, &t) {
            return Some(t);
        }
        t += chrono::Duration::minutes(1);
    }
    None
}

/// Delay from now until the next fire.
pub fn delay_until_next_fire(interval: &CalendarInterval) -> Option<Duration> {
    let now = Local::now();
    let next = next_fire_time(interval, now)?;
    (next - now).to_std().ok()
}

fn matches(interval: &CalendarInterval, t: &DateTime<Local>) -> bool {
    if interval.minute.is_some_and(|m| m != t.minute()) {
        return false;
    }
    if interval.hour.is_some_and(|h| h != t.hour()) {
        return false;
    }
    if interval.day.is_some_and(|d| d != t.day()) {
        return false;
    }
    if interval.month.is_some_and(|m| m != t.month()) {
        return false;
    }
    if let Some(weekday) = interval.weekday {
        if weekday % 7 != t.weekday().num_days_from_sunday() {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "calendar_tests.rs"]
mod tests;
