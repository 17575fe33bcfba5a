//! The persisted aggregate: every record a store keeps, plus schema metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    booking::Booking,
    common::{find_by_id, find_by_id_mut, Hours},
    package::{HourPackage, LedgerTransaction},
    student::Student,
};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default = "Dataset::schema_version_default")]
    pub schema_version: u8,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub packages: Vec<HourPackage>,
    #[serde(default)]
    pub transactions: Vec<LedgerTransaction>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            students: Vec::new(),
            bookings: Vec::new(),
            packages: Vec::new(),
            transactions: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn student(&self, id: Uuid) -> Option<&Student> {
        find_by_id(&self.students, id)
    }

    pub fn student_mut(&mut self, id: Uuid) -> Option<&mut Student> {
        find_by_id_mut(&mut self.students, id)
    }

    pub fn booking(&self, id: Uuid) -> Option<&Booking> {
        find_by_id(&self.bookings, id)
    }

    pub fn booking_mut(&mut self, id: Uuid) -> Option<&mut Booking> {
        find_by_id_mut(&mut self.bookings, id)
    }

    pub fn package(&self, id: Uuid) -> Option<&HourPackage> {
        find_by_id(&self.packages, id)
    }

    pub fn package_mut(&mut self, id: Uuid) -> Option<&mut HourPackage> {
        find_by_id_mut(&mut self.packages, id)
    }

    pub fn transaction(&self, id: Uuid) -> Option<&LedgerTransaction> {
        find_by_id(&self.transactions, id)
    }

    /// A student's packages in insertion order.
    pub fn packages_for(&self, student_id: Uuid) -> impl Iterator<Item = &HourPackage> {
        self.packages
            .iter()
            .filter(move |package| package.student_id == student_id)
    }

    pub fn bookings_for(&self, student_id: Uuid) -> impl Iterator<Item = &Booking> {
        self.bookings
            .iter()
            .filter(move |booking| booking.student_id == student_id)
    }

    pub fn transactions_for_package(
        &self,
        package_id: Uuid,
    ) -> impl Iterator<Item = &LedgerTransaction> {
        self.transactions
            .iter()
            .filter(move |txn| txn.package_id == package_id)
    }

    pub fn transactions_for_booking(
        &self,
        booking_id: Uuid,
    ) -> impl Iterator<Item = &LedgerTransaction> {
        self.transactions
            .iter()
            .filter(move |txn| txn.booking_id == booking_id)
    }

    /// Net hours currently charged against a booking (deductions minus corrections).
    pub fn net_charged(&self, booking_id: Uuid) -> Hours {
        self.transactions_for_booking(booking_id)
            .map(|txn| txn.hours_deducted)
            .sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}
