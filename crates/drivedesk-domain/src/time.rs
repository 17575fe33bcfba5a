//! Lesson time arithmetic: cadences, permitted durations, and date windows.
//!
//! Every function here is pure. Callers supply all instants; nothing reads the
//! system clock.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{common::Hours, plan::PlanError};

/// Repeat interval for a generated series of bookings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    None,
    Weekly,
    Fortnightly,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::None, Cadence::Weekly, Cadence::Fortnightly];

    /// Days between consecutive occurrences.
    pub fn interval_days(self) -> i64 {
        match self {
            Cadence::None => 0,
            Cadence::Weekly => 7,
            Cadence::Fortnightly => 14,
        }
    }

    pub fn repeats(self) -> bool {
        !matches!(self, Cadence::None)
    }

    pub fn label(self) -> &'static str {
        match self {
            Cadence::None => "One-off",
            Cadence::Weekly => "Weekly",
            Cadence::Fortnightly => "Fortnightly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Cadence::None => "none",
            Cadence::Weekly => "weekly",
            Cadence::Fortnightly => "fortnightly",
        };
        f.write_str(value)
    }
}

impl FromStr for Cadence {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "once" | "" => Ok(Cadence::None),
            "weekly" => Ok(Cadence::Weekly),
            "fortnightly" | "biweekly" => Ok(Cadence::Fortnightly),
            other => Err(PlanError::UnknownCadence(other.to_string())),
        }
    }
}

/// The fixed set of lesson lengths an instructor can book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LessonDuration {
    HalfHour,
    ThreeQuarters,
    OneHour,
    NinetyMinutes,
    TwoHours,
}

impl LessonDuration {
    pub const ALL: [LessonDuration; 5] = [
        LessonDuration::HalfHour,
        LessonDuration::ThreeQuarters,
        LessonDuration::OneHour,
        LessonDuration::NinetyMinutes,
        LessonDuration::TwoHours,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            LessonDuration::HalfHour => 30,
            LessonDuration::ThreeQuarters => 45,
            LessonDuration::OneHour => 60,
            LessonDuration::NinetyMinutes => 90,
            LessonDuration::TwoHours => 120,
        }
    }

    pub fn from_minutes(minutes: u32) -> Result<Self, PlanError> {
        Self::ALL
            .into_iter()
            .find(|duration| duration.minutes() == minutes)
            .ok_or(PlanError::UnsupportedDuration(minutes))
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(self.minutes() as i64)
    }

    pub fn hours(self) -> Hours {
        Hours::from_minutes(self.minutes() as i64)
    }
}

impl TryFrom<u32> for LessonDuration {
    type Error = PlanError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Self::from_minutes(minutes)
    }
}

impl From<LessonDuration> for u32 {
    fn from(duration: LessonDuration) -> u32 {
        duration.minutes()
    }
}

impl fmt::Display for LessonDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.minutes())
    }
}

pub fn add_days(start: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let offset = Duration::try_days(days)?;
    start.checked_add_signed(offset)
}

pub fn end_time(start: DateTime<Utc>, duration: LessonDuration) -> Option<DateTime<Utc>> {
    start.checked_add_signed(duration.as_duration())
}

/// Start of the `index`-th (0-based) occurrence of a series anchored at `anchor`.
pub fn occurrence_start(
    anchor: DateTime<Utc>,
    cadence: Cadence,
    index: u32,
) -> Option<DateTime<Utc>> {
    let days = cadence.interval_days().checked_mul(index as i64)?;
    add_days(anchor, days)
}

/// Half-open `[start, end)` range of instants used for calendar queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DateWindowError> {
        if end <= start {
            return Err(DateWindowError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`DateWindow`] values.
pub enum DateWindowError {
    InvalidRange,
}

impl fmt::Display for DateWindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateWindowError::InvalidRange => f.write_str("date window end must be after start"),
        }
    }
}

impl std::error::Error for DateWindowError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn cadence_intervals() {
        assert_eq!(Cadence::None.interval_days(), 0);
        assert_eq!(Cadence::Weekly.interval_days(), 7);
        assert_eq!(Cadence::Fortnightly.interval_days(), 14);
    }

    #[test]
    fn cadence_parses_common_spellings() {
        assert_eq!("Weekly".parse::<Cadence>().unwrap(), Cadence::Weekly);
        assert_eq!("biweekly".parse::<Cadence>().unwrap(), Cadence::Fortnightly);
        assert_eq!("none".parse::<Cadence>().unwrap(), Cadence::None);
        assert!("monthly".parse::<Cadence>().is_err());
    }

    #[test]
    fn occurrence_start_steps_by_interval() {
        let anchor = at(2024, 1, 1, 9);
        assert_eq!(
            occurrence_start(anchor, Cadence::Weekly, 3),
            Some(at(2024, 1, 22, 9))
        );
        assert_eq!(
            occurrence_start(anchor, Cadence::Fortnightly, 2),
            Some(at(2024, 1, 29, 9))
        );
        assert_eq!(occurrence_start(anchor, Cadence::None, 5), Some(anchor));
    }

    #[test]
    fn end_time_adds_lesson_length() {
        let start = at(2024, 2, 28, 23);
        assert_eq!(
            end_time(start, LessonDuration::NinetyMinutes),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 30, 0).unwrap())
        );
    }

    #[test]
    fn durations_outside_the_set_are_rejected() {
        assert_eq!(LessonDuration::from_minutes(60), Ok(LessonDuration::OneHour));
        assert_eq!(
            LessonDuration::from_minutes(50),
            Err(PlanError::UnsupportedDuration(50))
        );
        assert!(serde_json::from_str::<LessonDuration>("75").is_err());
        assert_eq!(
            serde_json::to_string(&LessonDuration::TwoHours).unwrap(),
            "120"
        );
    }

    #[test]
    fn window_is_half_open() {
        let window = DateWindow::new(at(2024, 1, 1, 0), at(2024, 1, 8, 0)).unwrap();
        assert!(window.contains(at(2024, 1, 1, 0)));
        assert!(window.contains(at(2024, 1, 7, 23)));
        assert!(!window.contains(at(2024, 1, 8, 0)));
        assert_eq!(
            DateWindow::new(at(2024, 1, 8, 0), at(2024, 1, 1, 0)),
            Err(DateWindowError::InvalidRange)
        );
    }
}
