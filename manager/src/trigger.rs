//! Trigger calculation
//!
//! Pure translation of one rule boundary (time-of-day, day set, timezone)
//! into a recurrence specification, and the forward scan that yields the
//! next matching wall-clock instant. No shared state; safe to call
//! repeatedly and concurrently.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, LocalResult, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::ValidationError;
use crate::rule::{TimeOfDay, Weekday};

/// Recurrence specification for one job: fire at `hour:minute` in
/// `timezone` on every weekday in `weekdays`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceSpec {
    pub hour: u32,
    pub minute: u32,
    pub weekdays: BTreeSet<Weekday>,
    pub timezone: Tz,
}

impl RecurrenceSpec {
    pub fn new(time: TimeOfDay, weekdays: BTreeSet<Weekday>, timezone: Tz) -> Self {
        Self {
            hour: time.hour as u32,
            minute: time.minute as u32,
            weekdays,
            timezone,
        }
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay { hour: self.hour as u8, minute: self.minute as u8 }
    }

    /// Next instant strictly after `after` at which this spec matches.
    ///
    /// Scans at most eight candidate days so that "today's time already
    /// passed, same weekday next week" is always covered. An ambiguous
    /// local time (clocks rolled back) resolves to the earlier instant; a
    /// local time skipped by a DST gap forfeits that day's occurrence and
    /// the scan moves on.
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_after = after.with_timezone(&self.timezone);

        for day_offset in 0..=7i64 {
            let date = local_after.date_naive() + Duration::days(day_offset);
            if !self.weekdays.contains(&Weekday::from_chrono(date.weekday())) {
                continue;
            }

            let Some(naive) = date.and_hms_opt(self.hour, self.minute, 0) else {
                continue;
            };
            let candidate = match self.timezone.from_local_datetime(&naive) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(earlier, _) => earlier,
                LocalResult::None => continue,
            };

            let candidate = candidate.with_timezone(&Utc);
            if candidate > after {
                return Some(candidate);
            }
        }

        None
    }
}

/// Build the recurrence spec for one rule boundary.
///
/// Malformed time strings, out-of-range components, and unknown timezones
/// fail here with a `ValidationError`, before any job registration.
pub fn compute_trigger(
    time: &str,
    days: &BTreeSet<Weekday>,
    timezone: &str,
) -> Result<RecurrenceSpec, ValidationError> {
    let time: TimeOfDay = time.parse()?;
    let timezone: Tz = timezone
        .parse()
        .map_err(|_| ValidationError::UnknownTimezone { name: timezone.to_string() })?;

    if days.is_empty() {
        return Err(ValidationError::EmptyDays);
    }

    Ok(RecurrenceSpec::new(time, days.clone(), timezone))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Weekday as ChronoWeekday};
    use rstest::rstest;

    fn days(tags: &[Weekday]) -> BTreeSet<Weekday> {
        tags.iter().copied().collect()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_compute_trigger_carries_fields() {
        let spec = compute_trigger("09:30", &days(&[Weekday::Mon, Weekday::Wed]), "UTC").unwrap();
        assert_eq!(spec.hour, 9);
        assert_eq!(spec.minute, 30);
        assert_eq!(spec.weekdays.len(), 2);
        assert_eq!(spec.timezone, chrono_tz::UTC);
    }

    #[test]
    fn test_compute_trigger_rejects_bad_inputs() {
        let mon = days(&[Weekday::Mon]);
        assert!(matches!(
            compute_trigger("25:00", &mon, "UTC"),
            Err(ValidationError::TimeOutOfRange { .. })
        ));
        assert!(matches!(
            compute_trigger("soon", &mon, "UTC"),
            Err(ValidationError::MalformedTime { .. })
        ));
        assert!(matches!(
            compute_trigger("09:00", &mon, "Mars/Olympus"),
            Err(ValidationError::UnknownTimezone { .. })
        ));
        assert!(matches!(
            compute_trigger("09:00", &BTreeSet::new(), "UTC"),
            Err(ValidationError::EmptyDays)
        ));
    }

    // 2024-01-01 is a Monday.
    #[rstest]
    // From Sunday evening, Monday morning fires next.
    #[case(utc(2023, 12, 31, 20, 0), utc(2024, 1, 1, 9, 0))]
    // From Monday after the trigger passed, Wednesday is next - never Tuesday.
    #[case(utc(2024, 1, 1, 17, 0), utc(2024, 1, 3, 9, 0))]
    // From Tuesday, nothing fires until Wednesday.
    #[case(utc(2024, 1, 2, 9, 0), utc(2024, 1, 3, 9, 0))]
    // From Wednesday after the trigger, wraps to Monday next week.
    #[case(utc(2024, 1, 3, 12, 0), utc(2024, 1, 8, 9, 0))]
    fn test_next_occurrence_mon_wed(#[case] after: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        let spec = compute_trigger("09:00", &days(&[Weekday::Mon, Weekday::Wed]), "UTC").unwrap();
        assert_eq!(spec.next_occurrence(after), Some(expected));
    }

    #[test]
    fn test_next_occurrence_is_strictly_after() {
        let spec = compute_trigger("09:00", &days(&[Weekday::Mon]), "UTC").unwrap();
        let exactly = utc(2024, 1, 1, 9, 0);
        // The very instant of a firing yields next week's occurrence.
        assert_eq!(spec.next_occurrence(exactly), Some(utc(2024, 1, 8, 9, 0)));
    }

    #[test]
    fn test_next_occurrence_same_weekday_later_today() {
        let spec = compute_trigger("09:00", &days(&[Weekday::Mon]), "UTC").unwrap();
        let early_monday = utc(2024, 1, 1, 6, 0);
        assert_eq!(spec.next_occurrence(early_monday), Some(utc(2024, 1, 1, 9, 0)));
    }

    #[test]
    fn test_next_occurrence_respects_timezone() {
        // 09:00 in New York is 14:00 UTC during winter time.
        let spec =
            compute_trigger("09:00", &days(&[Weekday::Mon]), "America/New_York").unwrap();
        let next = spec.next_occurrence(utc(2024, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 1, 14, 0));
    }

    #[test]
    fn test_next_occurrence_lands_on_configured_weekday() {
        let spec = compute_trigger("22:15", &days(&[Weekday::Sat, Weekday::Sun]), "UTC").unwrap();
        let next = spec.next_occurrence(utc(2024, 1, 1, 0, 0)).unwrap();
        assert!(matches!(
            next.weekday(),
            ChronoWeekday::Sat | ChronoWeekday::Sun
        ));
        assert_eq!((next.hour(), next.minute()), (22, 15));
    }
}
