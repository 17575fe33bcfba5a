use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{Hours, Identifiable};

/// A purchased block of prepaid lesson hours.
///
/// `remaining_hours` stays within `0..=package_hours`; it only moves through
/// ledger deductions and corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourPackage {
    pub id: Uuid,
    pub student_id: Uuid,
    pub package_hours: Hours,
    pub remaining_hours: Hours,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<f64>,
    pub purchase_date: NaiveDate,
}

impl HourPackage {
    /// Largest block of hours a single purchase may hold.
    pub const MAX_HOURS: Hours = Hours::whole(10_000);

    pub fn new(student_id: Uuid, package_hours: Hours, purchase_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            package_hours,
            remaining_hours: package_hours,
            amount_paid: None,
            purchase_date,
        }
    }

    pub fn with_amount_paid(mut self, amount: Option<f64>) -> Self {
        self.amount_paid = amount;
        self
    }

    pub fn used_hours(&self) -> Hours {
        self.package_hours - self.remaining_hours
    }

    pub fn is_exhausted(&self) -> bool {
        !self.remaining_hours.is_positive()
    }

    pub fn within_bounds(&self, remaining: Hours) -> bool {
        remaining >= Hours::ZERO && remaining <= self.package_hours
    }
}

impl Identifiable for HourPackage {
    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[default]
    Deduction,
    /// Offsets an earlier deduction; carries negative hours.
    Correction,
}

/// Immutable ledger row: hours drawn from one package for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub package_id: Uuid,
    pub booking_id: Uuid,
    pub hours_deducted: Hours,
    pub transaction_date: DateTime<Utc>,
    #[serde(default)]
    pub kind: TransactionKind,
}

impl LedgerTransaction {
    pub fn deduction(
        package_id: Uuid,
        booking_id: Uuid,
        hours: Hours,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            package_id,
            booking_id,
            hours_deducted: hours,
            transaction_date,
            kind: TransactionKind::Deduction,
        }
    }

    pub fn correction(
        package_id: Uuid,
        booking_id: Uuid,
        restored: Hours,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            package_id,
            booking_id,
            hours_deducted: -restored,
            transaction_date,
            kind: TransactionKind::Correction,
        }
    }
}

impl Identifiable for LedgerTransaction {
    fn id(&self) -> Uuid {
        self.id
    }
}
