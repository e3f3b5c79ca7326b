//! Component F — day-of-week and time-of-day access windows.
//!
//! A rule's restrictions combine by disjunction: if any one of them permits
//! the current moment, the rule permits it. Evaluation always runs in UTC;
//! see [`crate::model::TimeRestriction::timezone`] for why that field is
//! carried but unused.

use crate::model::{TimeRestriction, TimeWindowOutcome};
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};

fn day_number(weekday: Weekday) -> u8 {
    // Monday=1 .. Sunday=7, matching crate::model::DayOfWeek's convention.
    weekday.number_from_monday() as u8
}

fn day_matches(restriction: &TimeRestriction, today: u8) -> bool {
    match &restriction.days_of_week {
        None => true,
        Some(days) => days.is_empty() || days.contains(&today),
    }
}

fn time_matches(restriction: &TimeRestriction, now: NaiveTime) -> bool {
    match (restriction.start_time, restriction.end_time) {
        (Some(start), Some(end)) if start == end => true,
        (Some(start), Some(end)) if start < end => now >= start && now <= end,
        (Some(start), Some(end)) => now >= start || now <= end, // wraps midnight
        // Either bound absent means time is considered permissive.
        (None, _) | (_, None) => true,
    }
}

/// Evaluate a rule's time restrictions against `now`. An empty restriction
/// list means the rule is unrestricted.
pub fn evaluate(restrictions: &[TimeRestriction], now: DateTime<Utc>) -> TimeWindowOutcome {
    let enabled: Vec<&TimeRestriction> = restrictions.iter().filter(|r| r.enabled).collect();
    if enabled.is_empty() {
        return TimeWindowOutcome::Allowed;
    }

    let today = day_number(now.weekday());
    let time = now.time();
    if enabled.iter().any(|r| day_matches(r, today) && time_matches(r, time)) {
        TimeWindowOutcome::Allowed
    } else {
        TimeWindowOutcome::TimeRestricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleId;
    use chrono::TimeZone;

    fn restriction(
        start: Option<&str>,
        end: Option<&str>,
        days: Option<Vec<u8>>,
        enabled: bool,
    ) -> TimeRestriction {
        TimeRestriction {
            id: 1,
            rule_id: RuleId(1),
            start_time: start.map(|s| s.parse().unwrap()),
            end_time: end.map(|s| s.parse().unwrap()),
            days_of_week: days,
            timezone: None,
            enabled,
        }
    }

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        // 2026-07-29 is a Wednesday.
        Utc.with_ymd_and_hms(2026, 7, 29, hour, min, 0).unwrap()
    }

    #[test]
    fn no_restrictions_is_always_allowed() {
        assert_eq!(evaluate(&[], at(3, 0)), TimeWindowOutcome::Allowed);
    }

    #[test]
    fn disabled_restrictions_are_ignored() {
        let r = restriction(Some("09:00:00"), Some("17:00:00"), None, false);
        assert_eq!(evaluate(&[r], at(20, 0)), TimeWindowOutcome::Allowed);
    }

    #[test]
    fn simple_business_hours_window() {
        let r = restriction(Some("09:00:00"), Some("17:00:00"), None, true);
        assert_eq!(evaluate(&[r.clone()], at(12, 0)), TimeWindowOutcome::Allowed);
        assert_eq!(evaluate(&[r], at(20, 0)), TimeWindowOutcome::TimeRestricted);
    }

    #[test]
    fn midnight_wraparound_window() {
        let r = restriction(Some("22:00:00"), Some("06:00:00"), None, true);
        assert_eq!(evaluate(&[r.clone()], at(23, 0)), TimeWindowOutcome::Allowed);
        assert_eq!(evaluate(&[r.clone()], at(2, 0)), TimeWindowOutcome::Allowed);
        assert_eq!(evaluate(&[r], at(12, 0)), TimeWindowOutcome::TimeRestricted);
    }

    #[test]
    fn equal_start_and_end_means_always_permitted() {
        let r = restriction(Some("09:00:00"), Some("09:00:00"), None, true);
        assert_eq!(evaluate(&[r], at(3, 0)), TimeWindowOutcome::Allowed);
    }

    #[test]
    fn single_bound_is_time_permissive() {
        // Only start_time set: day matching still applies, but the time
        // component alone must never reject.
        let start_only = restriction(Some("09:00:00"), None, None, true);
        assert_eq!(evaluate(&[start_only.clone()], at(3, 0)), TimeWindowOutcome::Allowed);
        assert_eq!(evaluate(&[start_only], at(20, 0)), TimeWindowOutcome::Allowed);

        let end_only = restriction(None, Some("17:00:00"), None, true);
        assert_eq!(evaluate(&[end_only.clone()], at(3, 0)), TimeWindowOutcome::Allowed);
        assert_eq!(evaluate(&[end_only], at(20, 0)), TimeWindowOutcome::Allowed);
    }

    #[test]
    fn day_of_week_restriction() {
        // 2026-07-29 is a Wednesday (day 3).
        let r = restriction(None, None, Some(vec![1, 2]), true); // Mon, Tue only
        assert_eq!(evaluate(&[r], at(12, 0)), TimeWindowOutcome::TimeRestricted);
    }

    #[test]
    fn multiple_restrictions_combine_by_disjunction() {
        let weekday_business = restriction(Some("09:00:00"), Some("17:00:00"), Some(vec![1, 2, 3, 4, 5]), true);
        let weekend_any_time = restriction(None, None, Some(vec![6, 7]), true);
        let both = vec![weekday_business, weekend_any_time];
        // Wednesday at noon matches the first.
        assert_eq!(evaluate(&both, at(12, 0)), TimeWindowOutcome::Allowed);
        // Wednesday at 22:00 matches neither.
        assert_eq!(evaluate(&both, at(22, 0)), TimeWindowOutcome::TimeRestricted);
    }
}
