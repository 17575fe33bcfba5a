//! Typed lesson requests: the template every occurrence shares and the plan that
//! says when the occurrences fall. Both are validated once, at construction.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::LessonType,
    time::{Cadence, LessonDuration},
};

pub const MIN_OCCURRENCES: u32 = 1;
pub const MAX_OCCURRENCES: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Reasons a lesson request is rejected before any booking is generated.
pub enum PlanError {
    OccurrenceCount(u32),
    UnsupportedDuration(u32),
    UnknownCadence(String),
    UnknownLessonType(String),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::OccurrenceCount(count) => write!(
                f,
                "occurrence count {count} is outside {MIN_OCCURRENCES}..={MAX_OCCURRENCES}"
            ),
            PlanError::UnsupportedDuration(minutes) => {
                let allowed = LessonDuration::ALL
                    .iter()
                    .map(|d| d.minutes().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "lesson length of {minutes} minutes is not offered (allowed: {allowed})"
                )
            }
            PlanError::UnknownCadence(value) => write!(f, "unknown repeat cadence `{value}`"),
            PlanError::UnknownLessonType(value) => write!(f, "unknown lesson type `{value}`"),
        }
    }
}

impl std::error::Error for PlanError {}

/// What every occurrence of a generated series has in common.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonTemplate {
    request_id: Uuid,
    student_id: Uuid,
    lesson_type: LessonType,
    duration: LessonDuration,
    notes: Option<String>,
    targets: Option<String>,
}

impl LessonTemplate {
    /// Creates a template for a fresh request. The request id seeds the
    /// deterministic booking ids of the series.
    pub fn new(student_id: Uuid, lesson_type: LessonType, duration: LessonDuration) -> Self {
        Self::for_request(Uuid::new_v4(), student_id, lesson_type, duration)
    }

    pub fn for_request(
        request_id: Uuid,
        student_id: Uuid,
        lesson_type: LessonType,
        duration: LessonDuration,
    ) -> Self {
        Self {
            request_id,
            student_id,
            lesson_type,
            duration,
            notes: None,
            targets: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = non_blank(notes.into());
        self
    }

    pub fn with_targets(mut self, targets: impl Into<String>) -> Self {
        self.targets = non_blank(targets.into());
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn student_id(&self) -> Uuid {
        self.student_id
    }

    pub fn lesson_type(&self) -> LessonType {
        self.lesson_type
    }

    pub fn duration(&self) -> LessonDuration {
        self.duration
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn targets(&self) -> Option<&str> {
        self.targets.as_deref()
    }
}

/// When the occurrences of a series fall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrencePlan {
    anchor_start: DateTime<Utc>,
    cadence: Cadence,
    occurrence_count: u32,
}

impl RecurrencePlan {
    pub fn new(
        anchor_start: DateTime<Utc>,
        cadence: Cadence,
        occurrence_count: u32,
    ) -> Result<Self, PlanError> {
        if !(MIN_OCCURRENCES..=MAX_OCCURRENCES).contains(&occurrence_count) {
            return Err(PlanError::OccurrenceCount(occurrence_count));
        }
        Ok(Self {
            anchor_start,
            cadence,
            occurrence_count,
        })
    }

    pub fn single(anchor_start: DateTime<Utc>) -> Self {
        Self {
            anchor_start,
            cadence: Cadence::None,
            occurrence_count: 1,
        }
    }

    pub fn anchor_start(&self) -> DateTime<Utc> {
        self.anchor_start
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// The count the caller asked for.
    pub fn occurrence_count(&self) -> u32 {
        self.occurrence_count
    }

    /// Number of bookings the plan expands to; a non-repeating plan always
    /// yields one.
    pub fn effective_count(&self) -> u32 {
        if self.cadence.repeats() {
            self.occurrence_count
        } else {
            1
        }
    }
}

/// Loosely typed lesson request as submitted by a form or script. Converted to
/// a [`LessonTemplate`] and [`RecurrencePlan`] by [`LessonRequest::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonRequest {
    pub student_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub lesson_type: Option<String>,
    #[serde(default)]
    pub cadence: Option<String>,
    #[serde(default)]
    pub occurrence_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<String>,
}

impl LessonRequest {
    pub fn validate(&self) -> Result<(LessonTemplate, RecurrencePlan), PlanError> {
        let duration = LessonDuration::from_minutes(self.duration_minutes)?;
        let lesson_type = match self.lesson_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => LessonType::Lesson,
        };
        let cadence = match self.cadence.as_deref() {
            Some(raw) => raw.parse()?,
            None => Cadence::None,
        };
        let plan = RecurrencePlan::new(
            self.start_time,
            cadence,
            self.occurrence_count.unwrap_or(MIN_OCCURRENCES),
        )?;
        let mut template = LessonTemplate::new(self.student_id, lesson_type, duration);
        if let Some(notes) = &self.notes {
            template = template.with_notes(notes.clone());
        }
        if let Some(targets) = &self.targets {
            template = template.with_targets(targets.clone());
        }
        Ok((template, plan))
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
