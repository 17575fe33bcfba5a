//! Prepaid-hours ledger: packages, deductions, corrections and balances.

use std::sync::Arc;

use chrono::NaiveDate;
use drivedesk_domain::{BookingStatus, HourPackage, Hours, LedgerTransaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    audit::{audit_dataset, LedgerDiscrepancy},
    policy::{ConsumptionPolicy, OldestPurchaseFirst},
    store::{
        retry_on_conflict, BackofficeStore, ChangeSet, PackageUpdate, StatusChange,
        DEFAULT_COMMIT_ATTEMPTS,
    },
    time::Clock,
    CoreError, CoreResult, RecordKind,
};

/// Result of a committed deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionOutcome {
    pub student_id: Uuid,
    pub booking_id: Uuid,
    pub hours_deducted: Hours,
    /// One row per package touched, in consumption order.
    pub transactions: Vec<LedgerTransaction>,
    /// The student's total remaining hours after the deduction.
    pub remaining_balance: Hours,
}

/// A deduction worked out against the current balances but not yet committed.
#[derive(Debug, Clone)]
pub(crate) struct DeductionPlan {
    pub outcome: DeductionOutcome,
    pub change: ChangeSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageBalance {
    pub package_id: Uuid,
    pub purchase_date: NaiveDate,
    pub package_hours: Hours,
    pub remaining_hours: Hours,
    pub used_hours: Hours,
}

/// Aggregate view of a student's prepaid hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentBalance {
    pub student_id: Uuid,
    pub purchased: Hours,
    pub remaining: Hours,
    pub used: Hours,
    pub packages: Vec<PackageBalance>,
}

/// Owns every write to package balances and ledger transactions.
#[derive(Clone)]
pub struct HoursLedger {
    store: Arc<dyn BackofficeStore>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn ConsumptionPolicy>,
    max_attempts: u32,
}

impl HoursLedger {
    pub fn new(store: Arc<dyn BackofficeStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            policy: Arc::new(OldestPurchaseFirst),
            max_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_policy(mut self, policy: impl ConsumptionPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Upper bound on commit attempts when concurrent writers collide.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub(crate) fn store(&self) -> &Arc<dyn BackofficeStore> {
        &self.store
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Records a purchase. `purchase_date` defaults to today.
    pub fn create_package(
        &self,
        student_id: Uuid,
        package_hours: Hours,
        amount_paid: Option<f64>,
        purchase_date: Option<NaiveDate>,
    ) -> CoreResult<HourPackage> {
        if !package_hours.is_positive() {
            return Err(CoreError::Validation(
                "package hours must be positive".into(),
            ));
        }
        if package_hours > HourPackage::MAX_HOURS {
            return Err(CoreError::Validation(format!(
                "package hours must be at most {}",
                HourPackage::MAX_HOURS
            )));
        }
        if let Some(amount) = amount_paid {
            if !amount.is_finite() || amount < 0.0 {
                return Err(CoreError::Validation(
                    "amount paid must be a non-negative number".into(),
                ));
            }
        }
        self.require_student(student_id)?;

        let purchase_date = purchase_date.unwrap_or_else(|| self.clock.today());
        let package =
            HourPackage::new(student_id, package_hours, purchase_date).with_amount_paid(amount_paid);
        self.store.insert_package(package.clone())?;
        info!(
            %student_id,
            package_id = %package.id,
            hours = %package_hours,
            "hour package created"
        );
        Ok(package)
    }

    /// Draws `hours_needed` from the student's packages in policy order.
    /// Either the whole amount is deducted or nothing changes.
    ///
    /// A scheduled booking is marked completed in the same commit. A completed
    /// booking may be charged again once its earlier charge was refunded.
    /// Cancelled bookings are never charged.
    pub fn deduct(
        &self,
        student_id: Uuid,
        booking_id: Uuid,
        hours_needed: Hours,
    ) -> CoreResult<DeductionOutcome> {
        let outcome = retry_on_conflict(self.max_attempts, "deduct", || {
            let plan = self.plan_deduction(student_id, booking_id, hours_needed)?;
            self.store.apply(plan.change)?;
            Ok(plan.outcome)
        })?;
        info!(
            %student_id,
            %booking_id,
            hours = %outcome.hours_deducted,
            remaining = %outcome.remaining_balance,
            "hours deducted"
        );
        Ok(outcome)
    }

    pub(crate) fn plan_deduction(
        &self,
        student_id: Uuid,
        booking_id: Uuid,
        hours_needed: Hours,
    ) -> CoreResult<DeductionPlan> {
        if !hours_needed.is_positive() {
            return Err(CoreError::Validation(
                "hours to deduct must be positive".into(),
            ));
        }
        self.require_student(student_id)?;
        let booking = self
            .store
            .booking(booking_id)?
            .ok_or_else(|| CoreError::not_found(RecordKind::Booking, booking_id))?;
        if booking.student_id != student_id {
            return Err(CoreError::Validation(format!(
                "booking {booking_id} does not belong to student {student_id}"
            )));
        }
        let charged: Hours = self
            .store
            .transactions_for_booking(booking_id)?
            .iter()
            .map(|txn| txn.hours_deducted)
            .sum();
        if charged.is_positive() {
            return Err(CoreError::DuplicateDeduction(booking_id));
        }
        let status_change = match booking.status {
            BookingStatus::Scheduled => StatusChange {
                booking_id,
                from: BookingStatus::Scheduled,
                to: BookingStatus::Completed,
            },
            BookingStatus::Completed => StatusChange::hold(booking_id, BookingStatus::Completed),
            BookingStatus::Cancelled => {
                return Err(CoreError::InvalidTransition {
                    booking_id,
                    from: BookingStatus::Cancelled,
                    to: BookingStatus::Completed,
                })
            }
        };

        let mut packages: Vec<HourPackage> = self
            .store
            .packages_for_student(student_id)?
            .into_iter()
            .filter(|package| !package.is_exhausted())
            .collect();
        self.policy.order(&mut packages);

        let available: Hours = packages.iter().map(|p| p.remaining_hours).sum();
        if available < hours_needed {
            return Err(CoreError::InsufficientHours {
                student_id,
                requested: hours_needed,
                available,
            });
        }

        let now = self.clock.now();
        let mut still_needed = hours_needed;
        let mut change = ChangeSet {
            status_change: Some(status_change),
            uncharged_booking: Some(booking_id),
            ..ChangeSet::default()
        };
        for package in &packages {
            if !still_needed.is_positive() {
                break;
            }
            let take = package.remaining_hours.min(still_needed);
            change.package_updates.push(PackageUpdate {
                package_id: package.id,
                expected_remaining: package.remaining_hours,
                new_remaining: package.remaining_hours - take,
            });
            change
                .transactions
                .push(LedgerTransaction::deduction(package.id, booking_id, take, now));
            still_needed -= take;
        }
        debug!(
            %student_id,
            %booking_id,
            policy = self.policy.name(),
            packages = change.package_updates.len(),
            "planned deduction"
        );

        Ok(DeductionPlan {
            outcome: DeductionOutcome {
                student_id,
                booking_id,
                hours_deducted: hours_needed,
                transactions: change.transactions.clone(),
                remaining_balance: available - hours_needed,
            },
            change,
        })
    }

    /// Restores every hour still charged against `booking_id` to the package
    /// it came from, recording one correction per package.
    pub fn refund_booking(&self, booking_id: Uuid) -> CoreResult<Vec<LedgerTransaction>> {
        if self.store.booking(booking_id)?.is_none() {
            return Err(CoreError::not_found(RecordKind::Booking, booking_id));
        }
        let corrections = retry_on_conflict(self.max_attempts, "refund", || {
            let mut outstanding: Vec<(Uuid, Hours)> = Vec::new();
            for txn in self.store.transactions_for_booking(booking_id)? {
                match outstanding.iter_mut().find(|(id, _)| *id == txn.package_id) {
                    Some((_, net)) => *net += txn.hours_deducted,
                    None => outstanding.push((txn.package_id, txn.hours_deducted)),
                }
            }
            outstanding.retain(|(_, net)| net.is_positive());
            if outstanding.is_empty() {
                return Err(CoreError::Validation(format!(
                    "booking {booking_id} has no outstanding charge"
                )));
            }

            let now = self.clock.now();
            let mut change = ChangeSet::default();
            for (package_id, net) in outstanding {
                let package = self
                    .store
                    .package(package_id)?
                    .ok_or_else(|| CoreError::not_found(RecordKind::Package, package_id))?;
                change.package_updates.push(PackageUpdate {
                    package_id,
                    expected_remaining: package.remaining_hours,
                    new_remaining: package.remaining_hours + net,
                });
                change
                    .transactions
                    .push(LedgerTransaction::correction(package_id, booking_id, net, now));
            }
            let corrections = change.transactions.clone();
            self.store.apply(change)?;
            Ok(corrections)
        })?;
        let restored: Hours = corrections.iter().map(|txn| -txn.hours_deducted).sum();
        info!(%booking_id, hours = %restored, "booking charge refunded");
        Ok(corrections)
    }

    pub fn balance(&self, student_id: Uuid) -> CoreResult<StudentBalance> {
        self.require_student(student_id)?;
        let packages: Vec<PackageBalance> = self
            .store
            .packages_for_student(student_id)?
            .into_iter()
            .map(|package| PackageBalance {
                package_id: package.id,
                purchase_date: package.purchase_date,
                package_hours: package.package_hours,
                remaining_hours: package.remaining_hours,
                used_hours: package.used_hours(),
            })
            .collect();
        let purchased: Hours = packages.iter().map(|p| p.package_hours).sum();
        let remaining: Hours = packages.iter().map(|p| p.remaining_hours).sum();
        Ok(StudentBalance {
            student_id,
            purchased,
            remaining,
            used: purchased - remaining,
            packages,
        })
    }

    /// Checks every package against its transactions. An empty result means
    /// the ledger is consistent.
    pub fn audit(&self) -> CoreResult<Vec<LedgerDiscrepancy>> {
        let dataset = self.store.snapshot()?;
        let findings = audit_dataset(&dataset);
        for finding in &findings {
            warn!(package_id = %finding.package_id(), "ledger discrepancy: {finding}");
        }
        Ok(findings)
    }

    fn require_student(&self, student_id: Uuid) -> CoreResult<()> {
        match self.store.student(student_id)? {
            Some(_) => Ok(()),
            None => Err(CoreError::not_found(RecordKind::Student, student_id)),
        }
    }
}
