use std::{fmt, io};

use drivedesk_domain::{BookingStatus, DateWindowError, Hours, PlanError};
use thiserror::Error;
use uuid::Uuid;

/// The kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Student,
    Booking,
    Package,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Student => "Student",
            RecordKind::Booking => "Booking",
            RecordKind::Package => "Hour package",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: Uuid },
    #[error("Booking {booking_id} cannot move from {from} to {to}")]
    InvalidTransition {
        booking_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Not enough prepaid hours remaining: {requested} needed, {available} available")]
    InsufficientHours {
        student_id: Uuid,
        requested: Hours,
        available: Hours,
    },
    #[error("Booking {0} has already been charged")]
    DuplicateDeduction(Uuid),
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    pub fn not_found(kind: RecordKind, id: Uuid) -> Self {
        CoreError::NotFound { kind, id }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

impl From<PlanError> for CoreError {
    fn from(err: PlanError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<DateWindowError> for CoreError {
    fn from(err: DateWindowError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
