//! Time-window rule definitions
//!
//! A rule describes one recurring slowmode window on a channel: the days it
//! applies, the wall-clock boundaries, the value applied at the start and
//! the value restored at the end. Rules carry no behavior beyond
//! validation and identifier derivation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::constants::slowmode;
use crate::errors::ValidationError;

/// Weekday tags with the canonical mon=0..sun=6 indexing.
///
/// The derived `Ord` follows declaration order, so a `BTreeSet<Weekday>`
/// always iterates Monday-first. Every recurrence computation downstream
/// relies on this mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Fixed index, 0=mon .. 6=sun
    pub fn index(self) -> u8 {
        match self {
            Weekday::Mon => 0,
            Weekday::Tue => 1,
            Weekday::Wed => 2,
            Weekday::Thu => 3,
            Weekday::Fri => 4,
            Weekday::Sat => 5,
            Weekday::Sun => 6,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Weekday::Mon => "mon",
            Weekday::Tue => "tue",
            Weekday::Wed => "wed",
            Weekday::Thu => "thu",
            Weekday::Fri => "fri",
            Weekday::Sat => "sat",
            Weekday::Sun => "sun",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, ValidationError> {
        match tag {
            "mon" => Ok(Weekday::Mon),
            "tue" => Ok(Weekday::Tue),
            "wed" => Ok(Weekday::Wed),
            "thu" => Ok(Weekday::Thu),
            "fri" => Ok(Weekday::Fri),
            "sat" => Ok(Weekday::Sat),
            "sun" => Ok(Weekday::Sun),
            _ => Err(ValidationError::InvalidDayTag { tag: tag.to_string() }),
        }
    }

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Wall-clock time of day, minute resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedTime { input: s.to_string() };

        let (hour_str, minute_str) = s.split_once(':').ok_or_else(malformed)?;
        let hour: u32 = hour_str.trim().parse().map_err(|_| malformed())?;
        let minute: u32 = minute_str.trim().parse().map_err(|_| malformed())?;

        if hour > 23 {
            return Err(ValidationError::TimeOutOfRange { component: "hour", value: hour, max: 23 });
        }
        if minute > 59 {
            return Err(ValidationError::TimeOutOfRange {
                component: "minute",
                value: minute,
                max: 59,
            });
        }

        Ok(TimeOfDay { hour: hour as u8, minute: minute as u8 })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Resolve a list of day tags into a weekday set.
///
/// `None` and the `"all"` sentinel both expand to the full week; the stored
/// set never retains the sentinel. Tags are trimmed and case-insensitive,
/// duplicates collapse.
pub fn parse_day_set(tags: Option<&[String]>) -> Result<BTreeSet<Weekday>, ValidationError> {
    let mut days = BTreeSet::new();

    match tags {
        None => {
            days.extend(Weekday::ALL);
        }
        Some(tags) => {
            for raw in tags {
                let tag = raw.trim().to_ascii_lowercase();
                if tag.is_empty() {
                    continue;
                }
                if tag == "all" {
                    days.extend(Weekday::ALL);
                } else {
                    days.insert(Weekday::from_tag(&tag)?);
                }
            }
        }
    }

    if days.is_empty() {
        return Err(ValidationError::EmptyDays);
    }
    Ok(days)
}

/// Bounds-check a slowmode value against the platform maximum.
pub fn validate_slowmode_seconds(value: u32) -> Result<(), ValidationError> {
    if value > slowmode::MAX_SLOWMODE_SECONDS {
        return Err(ValidationError::SlowmodeOutOfRange {
            value,
            max: slowmode::MAX_SLOWMODE_SECONDS,
        });
    }
    Ok(())
}

/// One stored slowmode window, producing two recurring actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowmodeRule {
    pub id: String,
    pub owner_id: String,
    pub target_id: String,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub active_value: u32,
    pub restore_value: u32,
    pub days: BTreeSet<Weekday>,
    pub timezone: Tz,
    pub enabled: bool,
}

impl SlowmodeRule {
    /// Deterministic identifier so that re-adding an identical rule
    /// replaces rather than duplicates.
    pub fn derive_id(
        owner_id: &str,
        target_id: &str,
        start_time: TimeOfDay,
        end_time: TimeOfDay,
        days: &BTreeSet<Weekday>,
    ) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            owner_id,
            target_id,
            start_time,
            end_time,
            day_summary(days)
        )
    }

    /// Start and end fall on the same instant; the restore job wins.
    pub fn is_degenerate(&self) -> bool {
        self.start_time == self.end_time
    }

    pub fn day_summary(&self) -> String {
        day_summary(&self.days)
    }
}

fn day_summary(days: &BTreeSet<Weekday>) -> String {
    days.iter().map(|d| d.tag()).collect::<Vec<_>>().join(",")
}
