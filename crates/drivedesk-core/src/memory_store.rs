use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use drivedesk_domain::{Booking, Dataset, HourPackage, LedgerTransaction, Student};
use uuid::Uuid;

use crate::{
    store::{self, BackofficeStore, ChangeSet},
    CoreError, CoreResult,
};

/// Store keeping everything in process memory behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    dataset: RwLock<Dataset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        Self {
            dataset: RwLock::new(dataset),
        }
    }

    fn read(&self) -> CoreResult<RwLockReadGuard<'_, Dataset>> {
        self.dataset
            .read()
            .map_err(|_| CoreError::Persistence("memory store lock poisoned".into()))
    }

    fn write(&self) -> CoreResult<RwLockWriteGuard<'_, Dataset>> {
        self.dataset
            .write()
            .map_err(|_| CoreError::Persistence("memory store lock poisoned".into()))
    }
}

impl BackofficeStore for MemoryStore {
    fn student(&self, id: Uuid) -> CoreResult<Option<Student>> {
        Ok(self.read()?.student(id).cloned())
    }

    fn students(&self) -> CoreResult<Vec<Student>> {
        Ok(self.read()?.students.clone())
    }

    fn insert_student(&self, student: Student) -> CoreResult<()> {
        store::insert_student(&mut *self.write()?, student)
    }

    fn update_student(&self, student: Student) -> CoreResult<()> {
        store::update_student(&mut *self.write()?, student)
    }

    fn booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.read()?.booking(id).cloned())
    }

    fn bookings_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Booking>> {
        Ok(self.read()?.bookings_for(student_id).cloned().collect())
    }

    fn insert_bookings(&self, bookings: &[Booking]) -> CoreResult<()> {
        store::insert_bookings(&mut *self.write()?, bookings)
    }

    fn package(&self, id: Uuid) -> CoreResult<Option<HourPackage>> {
        Ok(self.read()?.package(id).cloned())
    }

    fn packages_for_student(&self, student_id: Uuid) -> CoreResult<Vec<HourPackage>> {
        Ok(self.read()?.packages_for(student_id).cloned().collect())
    }

    fn insert_package(&self, package: HourPackage) -> CoreResult<()> {
        store::insert_package(&mut *self.write()?, package)
    }

    fn transactions_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<LedgerTransaction>> {
        Ok(self
            .read()?
            .transactions_for_booking(booking_id)
            .cloned()
            .collect())
    }

    fn transactions_for_package(&self, package_id: Uuid) -> CoreResult<Vec<LedgerTransaction>> {
        Ok(self
            .read()?
            .transactions_for_package(package_id)
            .cloned()
            .collect())
    }

    fn snapshot(&self) -> CoreResult<Dataset> {
        Ok(self.read()?.clone())
    }

    fn apply(&self, change: ChangeSet) -> CoreResult<()> {
        store::apply_change_set(&mut *self.write()?, change)
    }
}
