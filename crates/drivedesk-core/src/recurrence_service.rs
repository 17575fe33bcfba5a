//! Expands a lesson template and recurrence plan into concrete bookings.

use std::iter::FusedIterator;

use drivedesk_domain::{
    end_time, occurrence_start, Booking, BookingStatus, LessonTemplate, RecurrencePlan,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{store::BackofficeStore, CoreError, CoreResult, RecordKind};

/// Generates booking series. Generation is pure; [`BookingGenerator::schedule`]
/// is the only entry point that persists.
pub struct BookingGenerator;

impl BookingGenerator {
    /// Returns the bookings described by `template` and `plan` without
    /// persisting anything.
    ///
    /// Identical inputs always produce identical bookings, ids included.
    pub fn generate(template: &LessonTemplate, plan: &RecurrencePlan) -> CoreResult<Occurrences> {
        let len = plan.effective_count();
        let last_start = occurrence_start(plan.anchor_start(), plan.cadence(), len - 1)
            .ok_or_else(out_of_range)?;
        end_time(last_start, template.duration()).ok_or_else(out_of_range)?;

        let series_id = series_id(template, plan);
        debug!(
            student_id = %template.student_id(),
            %series_id,
            cadence = plan.cadence().label(),
            count = len,
            "expanding lesson series"
        );
        Ok(Occurrences {
            template: template.clone(),
            plan: *plan,
            series_id,
            next: 0,
            len,
        })
    }

    /// Generates the series and stores every booking in one batch.
    pub fn schedule(
        store: &dyn BackofficeStore,
        template: &LessonTemplate,
        plan: &RecurrencePlan,
    ) -> CoreResult<Vec<Booking>> {
        let occurrences = Self::generate(template, plan)?;
        let series_id = occurrences.series_id();
        if store.student(template.student_id())?.is_none() {
            return Err(CoreError::not_found(
                RecordKind::Student,
                template.student_id(),
            ));
        }
        let bookings: Vec<Booking> = occurrences.collect();
        store.insert_bookings(&bookings)?;
        info!(
            student_id = %template.student_id(),
            %series_id,
            count = bookings.len(),
            "scheduled lesson series"
        );
        Ok(bookings)
    }
}

fn out_of_range() -> CoreError {
    CoreError::Validation("lesson series extends beyond the supported calendar range".into())
}

fn series_id(template: &LessonTemplate, plan: &RecurrencePlan) -> Uuid {
    let key = format!(
        "{}|{}|{}|{}|{}|{}",
        template.student_id(),
        plan.anchor_start().to_rfc3339(),
        plan.cadence().label(),
        plan.effective_count(),
        template.duration().minutes(),
        template.lesson_type(),
    );
    Uuid::new_v5(&template.request_id(), key.as_bytes())
}

/// Lazy, restartable sequence of the bookings in one series.
#[derive(Debug, Clone)]
pub struct Occurrences {
    template: LessonTemplate,
    plan: RecurrencePlan,
    series_id: Uuid,
    next: u32,
    len: u32,
}

impl Occurrences {
    pub fn series_id(&self) -> Uuid {
        self.series_id
    }

    /// Rewinds to the first occurrence.
    pub fn restart(&mut self) {
        self.next = 0;
    }

    fn build(&self, index: u32) -> Option<Booking> {
        let start_time = occurrence_start(self.plan.anchor_start(), self.plan.cadence(), index)?;
        let end_time = end_time(start_time, self.template.duration())?;
        Some(Booking {
            id: Uuid::new_v5(&self.series_id, &index.to_be_bytes()),
            student_id: self.template.student_id(),
            start_time,
            end_time,
            lesson_type: self.template.lesson_type(),
            status: BookingStatus::Scheduled,
            notes: self.template.notes().map(str::to_owned),
            targets: self.template.targets().map(str::to_owned),
            series_id: self.plan.cadence().repeats().then_some(self.series_id),
            occurrence_index: index,
        })
    }
}

impl Iterator for Occurrences {
    type Item = Booking;

    fn next(&mut self) -> Option<Booking> {
        if self.next >= self.len {
            return None;
        }
        let booking = self.build(self.next);
        self.next += 1;
        booking
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Occurrences {}

impl FusedIterator for Occurrences {}
