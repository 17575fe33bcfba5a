//! Persistence seam for the core services.
//!
//! Stores expose plain reads plus one transactional write, [`BackofficeStore::apply`],
//! which checks every precondition of a [`ChangeSet`] and then applies all of
//! it or none of it. The free functions in this module implement those rules
//! over a [`Dataset`] so every backend enforces them identically.

use std::collections::{HashMap, HashSet};

use drivedesk_domain::{
    Booking, BookingStatus, Dataset, HourPackage, Hours, LedgerTransaction, Student,
};
use tracing::warn;
use uuid::Uuid;

use crate::{CoreError, CoreResult, RecordKind};

pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 8;

/// Abstraction over persistence backends holding students, bookings and the hours ledger.
pub trait BackofficeStore: Send + Sync {
    fn student(&self, id: Uuid) -> CoreResult<Option<Student>>;
    fn students(&self) -> CoreResult<Vec<Student>>;
    fn insert_student(&self, student: Student) -> CoreResult<()>;
    fn update_student(&self, student: Student) -> CoreResult<()>;

    fn booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;
    fn bookings_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Booking>>;
    /// Inserts a batch of bookings atomically; duplicates reject the whole batch.
    fn insert_bookings(&self, bookings: &[Booking]) -> CoreResult<()>;

    fn package(&self, id: Uuid) -> CoreResult<Option<HourPackage>>;
    /// A student's packages in insertion order.
    fn packages_for_student(&self, student_id: Uuid) -> CoreResult<Vec<HourPackage>>;
    fn insert_package(&self, package: HourPackage) -> CoreResult<()>;

    fn transactions_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<LedgerTransaction>>;
    fn transactions_for_package(&self, package_id: Uuid) -> CoreResult<Vec<LedgerTransaction>>;

    /// Point-in-time copy of everything the store holds.
    fn snapshot(&self) -> CoreResult<Dataset>;

    /// Applies a change set atomically. A stale precondition yields
    /// [`CoreError::Conflict`] and leaves the store untouched.
    fn apply(&self, change: ChangeSet) -> CoreResult<()>;
}

/// Compare-and-swap on one package's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpdate {
    pub package_id: Uuid,
    pub expected_remaining: Hours,
    pub new_remaining: Hours,
}

/// Compare-and-swap on one booking's status. `from == to` only asserts the
/// booking is still in that status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub booking_id: Uuid,
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl StatusChange {
    pub fn hold(booking_id: Uuid, status: BookingStatus) -> Self {
        Self {
            booking_id,
            from: status,
            to: status,
        }
    }
}

/// One atomic unit of ledger and lifecycle writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub package_updates: Vec<PackageUpdate>,
    pub transactions: Vec<LedgerTransaction>,
    pub status_change: Option<StatusChange>,
    /// Rejects the change if this booking already carries a net charge.
    pub uncharged_booking: Option<Uuid>,
}

impl ChangeSet {
    pub fn status_only(change: StatusChange) -> Self {
        Self {
            status_change: Some(change),
            ..Self::default()
        }
    }

    pub fn with_status_change(mut self, change: StatusChange) -> Self {
        self.status_change = Some(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.package_updates.is_empty()
            && self.transactions.is_empty()
            && self.status_change.is_none()
    }
}

/// Runs `attempt` until it returns something other than a conflict, at most
/// `max_attempts` times.
pub fn retry_on_conflict<T>(
    max_attempts: u32,
    operation: &str,
    mut attempt: impl FnMut() -> CoreResult<T>,
) -> CoreResult<T> {
    let limit = max_attempts.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt() {
            Err(err) if err.is_conflict() && tries < limit => {
                warn!(operation, attempt = tries, error = %err, "retrying after concurrent update");
            }
            other => return other,
        }
    }
}

pub fn insert_student(dataset: &mut Dataset, student: Student) -> CoreResult<()> {
    if dataset.student(student.id).is_some() {
        return Err(CoreError::Validation(format!(
            "student {} already exists",
            student.id
        )));
    }
    dataset.students.push(student);
    dataset.touch();
    Ok(())
}

pub fn update_student(dataset: &mut Dataset, student: Student) -> CoreResult<()> {
    let slot = dataset
        .student_mut(student.id)
        .ok_or_else(|| CoreError::not_found(RecordKind::Student, student.id))?;
    *slot = student;
    dataset.touch();
    Ok(())
}

pub fn insert_bookings(dataset: &mut Dataset, bookings: &[Booking]) -> CoreResult<()> {
    let mut batch_ids = HashSet::new();
    for booking in bookings {
        if dataset.student(booking.student_id).is_none() {
            return Err(CoreError::not_found(
                RecordKind::Student,
                booking.student_id,
            ));
        }
        if booking.end_time <= booking.start_time {
            return Err(CoreError::Validation(format!(
                "booking {} ends before it starts",
                booking.id
            )));
        }
        if dataset.booking(booking.id).is_some() || !batch_ids.insert(booking.id) {
            return Err(CoreError::Validation(format!(
                "booking {} already exists",
                booking.id
            )));
        }
    }
    dataset.bookings.extend_from_slice(bookings);
    dataset.touch();
    Ok(())
}

pub fn insert_package(dataset: &mut Dataset, package: HourPackage) -> CoreResult<()> {
    if dataset.student(package.student_id).is_none() {
        return Err(CoreError::not_found(
            RecordKind::Student,
            package.student_id,
        ));
    }
    if !package.package_hours.is_positive() {
        return Err(CoreError::Validation(
            "package hours must be positive".into(),
        ));
    }
    if package.package_hours > HourPackage::MAX_HOURS {
        return Err(CoreError::Validation(format!(
            "package hours must be at most {}",
            HourPackage::MAX_HOURS
        )));
    }
    if package.remaining_hours != package.package_hours {
        return Err(CoreError::Validation(
            "a new package must start with its full balance".into(),
        ));
    }
    if dataset.package(package.id).is_some() {
        return Err(CoreError::Validation(format!(
            "package {} already exists",
            package.id
        )));
    }
    dataset.packages.push(package);
    dataset.touch();
    Ok(())
}

/// Checks every precondition of `change` against `dataset`, then applies it.
/// Nothing is written unless every check passes.
pub fn apply_change_set(dataset: &mut Dataset, change: ChangeSet) -> CoreResult<()> {
    if change.is_empty() {
        return Ok(());
    }

    if let Some(status) = &change.status_change {
        let booking = dataset
            .booking(status.booking_id)
            .ok_or_else(|| CoreError::not_found(RecordKind::Booking, status.booking_id))?;
        if booking.status != status.from {
            return Err(CoreError::Conflict(format!(
                "booking {} is {} but {} was expected",
                booking.id, booking.status, status.from
            )));
        }
        if status.from != status.to && !status.from.can_transition_to(status.to) {
            return Err(CoreError::InvalidTransition {
                booking_id: booking.id,
                from: status.from,
                to: status.to,
            });
        }
    }

    if let Some(booking_id) = change.uncharged_booking {
        if dataset.net_charged(booking_id).is_positive() {
            return Err(CoreError::DuplicateDeduction(booking_id));
        }
    }

    let mut movement: HashMap<Uuid, Hours> = HashMap::new();
    let mut new_ids = HashSet::new();
    for txn in &change.transactions {
        if dataset.transaction(txn.id).is_some() || !new_ids.insert(txn.id) {
            return Err(CoreError::Validation(format!(
                "ledger transaction {} already exists",
                txn.id
            )));
        }
        if dataset.package(txn.package_id).is_none() {
            return Err(CoreError::not_found(RecordKind::Package, txn.package_id));
        }
        *movement.entry(txn.package_id).or_default() += txn.hours_deducted;
    }

    let mut touched = HashSet::new();
    for update in &change.package_updates {
        if !touched.insert(update.package_id) {
            return Err(CoreError::Validation(format!(
                "package {} updated twice in one change",
                update.package_id
            )));
        }
        let package = dataset
            .package(update.package_id)
            .ok_or_else(|| CoreError::not_found(RecordKind::Package, update.package_id))?;
        if package.remaining_hours != update.expected_remaining {
            return Err(CoreError::Conflict(format!(
                "package {} balance is {} but {} was expected",
                package.id, package.remaining_hours, update.expected_remaining
            )));
        }
        if !package.within_bounds(update.new_remaining) {
            return Err(CoreError::Validation(format!(
                "package {} balance {} would leave 0..={}",
                package.id, update.new_remaining, package.package_hours
            )));
        }
        let moved = movement
            .remove(&update.package_id)
            .unwrap_or(Hours::ZERO);
        if update.expected_remaining - update.new_remaining != moved {
            return Err(CoreError::Validation(format!(
                "balance change for package {} does not match its transactions",
                package.id
            )));
        }
    }
    if let Some(package_id) = movement
        .iter()
        .find(|(_, hours)| !hours.is_zero())
        .map(|(id, _)| *id)
    {
        return Err(CoreError::Validation(format!(
            "transactions for package {package_id} carry no balance update"
        )));
    }

    for update in change.package_updates {
        if let Some(package) = dataset.package_mut(update.package_id) {
            package.remaining_hours = update.new_remaining;
        }
    }
    dataset.transactions.extend(change.transactions);
    if let Some(status) = change.status_change {
        if let Some(booking) = dataset.booking_mut(status.booking_id) {
            booking.status = status.to;
        }
    }
    dataset.touch();
    Ok(())
}
