//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, N-M, and comma lists. DOW uses 0-7 with both
//! 0 and 7 meaning Sunday.
//!
//! No cron crate dependency; a minute-by-minute forward search is cheap
//! at the frequency schedules are consulted.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// How far ahead the search looks before giving up. Covers any yearly
/// schedule; expressions with no occurrence inside the horizon are
/// treated as yielding none at all.
const SEARCH_HORIZON_MINUTES: i64 = 370 * 24 * 60;

/// Compute the first occurrence of `expression` strictly after `after`.
/// Returns `None` for unparseable or never-matching expressions; the
/// caller decides the fallback.
pub fn next_occurrence(expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        tracing::warn!(
            "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
            expression
        );
        return None;
    }

    let minutes = parse_field(fields[0], 0, 59)?;
    let hours = parse_field(fields[1], 0, 23)?;
    let days = parse_field(fields[2], 1, 31)?;
    let months = parse_field(fields[3], 1, 12)?;
    // 7 is an alias for Sunday (0)
    let weekdays: Vec<u32> = parse_field(fields[4], 0, 7)?
        .into_iter()
        .map(|d| if d == 7 { 0 } else { d })
        .collect();

    // vixie-cron day semantics: when both day fields are restricted,
    // either one matching selects the day
    let dom_restricted = fields[2] != "*";
    let dow_restricted = fields[4] != "*";

    let mut candidate = (after + Duration::minutes(1))
        .with_second(0)
        .and_then(|c| c.with_nanosecond(0))
        .unwrap_or(after);

    for _ in 0..SEARCH_HORIZON_MINUTES {
        let minute_ok = minutes.contains(&candidate.minute());
        let hour_ok = hours.contains(&candidate.hour());
        let month_ok = months.contains(&candidate.month());
        let dom_ok = days.contains(&candidate.day());
        let dow_ok = weekdays.contains(&candidate.weekday().num_days_from_sunday());
        let day_ok = if dom_restricted && dow_restricted {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        };

        if minute_ok && hour_ok && month_ok && day_ok {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Parse one cron field into the list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N — every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // comma list, each element a value or a range
    let mut values = Vec::new();
    for part in field.split(',') {
        let part = part.trim();
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: u32 = lo.parse().ok()?;
            let hi: u32 = hi.parse().ok()?;
            if lo > hi || lo < min || hi > max {
                return None;
            }
            values.extend(lo..=hi);
        } else {
            let n: u32 = part.parse().ok()?;
            if n < min || n > max {
                return None;
            }
            values.push(n);
        }
    }
    if values.is_empty() { None } else { Some(values) }
}
