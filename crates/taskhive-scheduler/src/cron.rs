//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Wildcards: *, */N, N, comma lists
//! Minute, hour, and day-of-week are honored (DOW 0-6, 0 = Sunday);
//! day-of-month and month are simplified to * only.
//! Example: "0 8 * * 1" = every Monday at 8:00

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// Parse a cron expression and compute the next run time after `after`.
pub fn next_run_from_cron(expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        tracing::warn!(
            "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
            expression
        );
        return None;
    }

    let minutes = parse_field(parts[0], 0, 59)?;
    let hours = parse_field(parts[1], 0, 23)?;
    let _dom_spec = parts[2]; // Day of month (simplified: only * supported)
    let _mon_spec = parts[3]; // Month (simplified: only * supported)
    let weekdays = parse_field(parts[4], 0, 6)?;

    // Find next matching time after `after`
    let mut candidate = after + Duration::minutes(1);
    candidate = candidate.with_second(0).unwrap_or(candidate);
    candidate = candidate.with_nanosecond(0).unwrap_or(candidate);

    // Try up to 8 days ahead — enough to reach any day-of-week
    for _ in 0..(8 * 24 * 60) {
        let m = candidate.minute();
        let h = candidate.hour();
        let dow = candidate.weekday().num_days_from_sunday();

        if minutes.contains(&m) && hours.contains(&h) && weekdays.contains(&dow) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Parse a cron field into a list of matching values.
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

    // Comma-separated: "0,15,30,45"
    if field.contains(',') {
        let vals: Result<Vec<u32>, _> = field.split(',').map(|s| s.trim().parse()).collect();
        return vals
            .ok()
            .map(|v| v.into_iter().filter(|x| *x >= min && *x <= max).collect());
    }

    // Single number
    let n: u32 = field.parse().ok()?;
    if n >= min && n <= max {
        Some(vec![n])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_every_hour() {
        let after = Utc.with_ymd_and_hms(2026, 8, 6, 10, 30, 0).unwrap();
        let next = next_run_from_cron("0 * * * *", after).unwrap();
        assert_eq!(next.hour(), 11);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_daily_at_nine() {
        let after = Utc.with_ymd_and_hms(2026, 8, 6, 7, 0, 0).unwrap();
        let next = next_run_from_cron("0 9 * * *", after).unwrap();
        assert_eq!(next.hour(), 9);
        assert_eq!(next.minute(), 0);
        assert_eq!(next.day(), 6);
    }

    #[test]
    fn test_daily_wraps_to_next_day() {
        let after = Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap();
        let next = next_run_from_cron("0 9 * * *", after).unwrap();
        assert_eq!(next.day(), 7);
        assert_eq!(next.hour(), 9);
    }

    #[test]
    fn test_weekly_monday_morning() {
        // 2026-08-06 is a Thursday; next Monday is 2026-08-10
        let after = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let next = next_run_from_cron("0 8 * * 1", after).unwrap();
        assert_eq!(next.weekday(), chrono::Weekday::Mon);
        assert_eq!(next.day(), 10);
        assert_eq!(next.hour(), 8);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_weekly_same_day_before_hour() {
        // A Monday, before 8:00 — fires later the same day
        let after = Utc.with_ymd_and_hms(2026, 8, 10, 6, 0, 0).unwrap();
        let next = next_run_from_cron("0 8 * * 1", after).unwrap();
        assert_eq!(next.day(), 10);
        assert_eq!(next.hour(), 8);
    }

    #[test]
    fn test_every_15_minutes() {
        let after = Utc.with_ymd_and_hms(2026, 8, 6, 10, 2, 0).unwrap();
        let next = next_run_from_cron("*/15 * * * *", after).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_invalid_expression() {
        let after = Utc::now();
        assert!(next_run_from_cron("bad", after).is_none());
        assert!(next_run_from_cron("61 9 * * *", after).is_none());
    }
}
