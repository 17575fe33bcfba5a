use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::{Hours, Identifiable},
    plan::PlanError,
};

/// One calendar slot with a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub student_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub lesson_type: LessonType,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<String>,
    #[serde(default)]
    pub series_id: Option<Uuid>,
    #[serde(default)]
    pub occurrence_index: u32,
}

impl Booking {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Hours a completed booking consumes from the student's packages.
    pub fn billable_hours(&self) -> Hours {
        Hours::from_minutes(self.duration().num_minutes())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Identifiable for Booking {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Lesson,
    Test,
    Personal,
}

impl fmt::Display for LessonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LessonType::Lesson => "lesson",
            LessonType::Test => "test",
            LessonType::Personal => "personal",
        };
        f.write_str(label)
    }
}

impl FromStr for LessonType {
    type Err = PlanError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lesson" => Ok(LessonType::Lesson),
            "test" => Ok(LessonType::Test),
            "personal" => Ok(LessonType::Personal),
            other => Err(PlanError::UnknownLessonType(other.to_string())),
        }
    }
}

/// Booking lifecycle. `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Scheduled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Scheduled, BookingStatus::Completed)
                | (BookingStatus::Scheduled, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
