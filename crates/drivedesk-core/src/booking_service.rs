//! Booking status transitions and calendar queries.

use drivedesk_domain::{Booking, BookingStatus, DateWindow};
use tracing::info;
use uuid::Uuid;

use crate::{
    ledger_service::{DeductionOutcome, HoursLedger},
    store::{retry_on_conflict, ChangeSet, StatusChange},
    CoreError, CoreResult, RecordKind,
};

/// Drives bookings through `scheduled -> completed | cancelled`.
#[derive(Clone)]
pub struct BookingLifecycle {
    ledger: HoursLedger,
}

impl BookingLifecycle {
    pub fn new(ledger: HoursLedger) -> Self {
        Self { ledger }
    }

    /// Marks a scheduled booking completed and charges its duration to the
    /// student's packages. The status flip and the deduction commit together;
    /// if the deduction fails the booking stays scheduled.
    pub fn complete(&self, booking_id: Uuid) -> CoreResult<DeductionOutcome> {
        let outcome = retry_on_conflict(self.ledger.max_attempts(), "complete", || {
            let booking = self.scheduled_booking(booking_id, BookingStatus::Completed)?;
            let plan = self.ledger.plan_deduction(
                booking.student_id,
                booking.id,
                booking.billable_hours(),
            )?;
            self.ledger.store().apply(plan.change)?;
            Ok(plan.outcome)
        })?;
        info!(
            %booking_id,
            student_id = %outcome.student_id,
            hours = %outcome.hours_deducted,
            remaining = %outcome.remaining_balance,
            "booking completed"
        );
        Ok(outcome)
    }

    /// Cancels a scheduled booking. The ledger is never touched.
    pub fn cancel(&self, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = retry_on_conflict(self.ledger.max_attempts(), "cancel", || {
            let mut booking = self.scheduled_booking(booking_id, BookingStatus::Cancelled)?;
            self.ledger
                .store()
                .apply(ChangeSet::status_only(StatusChange {
                    booking_id,
                    from: BookingStatus::Scheduled,
                    to: BookingStatus::Cancelled,
                }))?;
            booking.status = BookingStatus::Cancelled;
            Ok(booking)
        })?;
        info!(%booking_id, student_id = %booking.student_id, "booking cancelled");
        Ok(booking)
    }

    /// A student's bookings starting inside `window`, earliest first.
    pub fn bookings_for(&self, student_id: Uuid, window: DateWindow) -> CoreResult<Vec<Booking>> {
        let store = self.ledger.store();
        if store.student(student_id)?.is_none() {
            return Err(CoreError::not_found(RecordKind::Student, student_id));
        }
        let mut bookings: Vec<Booking> = store
            .bookings_for_student(student_id)?
            .into_iter()
            .filter(|booking| window.contains(booking.start_time))
            .collect();
        bookings.sort_by_key(|booking| (booking.start_time, booking.occurrence_index));
        Ok(bookings)
    }

    /// Every booking a student has, earliest first.
    pub fn all_bookings_for(&self, student_id: Uuid) -> CoreResult<Vec<Booking>> {
        let store = self.ledger.store();
        if store.student(student_id)?.is_none() {
            return Err(CoreError::not_found(RecordKind::Student, student_id));
        }
        let mut bookings = store.bookings_for_student(student_id)?;
        bookings.sort_by_key(|booking| (booking.start_time, booking.occurrence_index));
        Ok(bookings)
    }

    fn scheduled_booking(&self, booking_id: Uuid, to: BookingStatus) -> CoreResult<Booking> {
        let booking = self
            .ledger
            .store()
            .booking(booking_id)?
            .ok_or_else(|| CoreError::not_found(RecordKind::Booking, booking_id))?;
        if !booking.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                booking_id,
                from: booking.status,
                to,
            });
        }
        Ok(booking)
    }
}
