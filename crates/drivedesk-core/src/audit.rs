//! Consistency checks over the hours ledger.

use std::{collections::HashMap, fmt};

use drivedesk_domain::{Dataset, Hours};
use uuid::Uuid;

/// A ledger inconsistency found by [`audit_dataset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerDiscrepancy {
    /// `package_hours - remaining_hours` differs from the package's transaction sum.
    BalanceMismatch {
        package_id: Uuid,
        recorded_used: Hours,
        transaction_total: Hours,
    },
    OutOfBounds {
        package_id: Uuid,
        remaining: Hours,
        package_hours: Hours,
    },
    OrphanTransaction {
        transaction_id: Uuid,
        package_id: Uuid,
    },
    UnknownStudent {
        package_id: Uuid,
        student_id: Uuid,
    },
}

impl LedgerDiscrepancy {
    pub fn package_id(&self) -> Uuid {
        match self {
            LedgerDiscrepancy::BalanceMismatch { package_id, .. }
            | LedgerDiscrepancy::OutOfBounds { package_id, .. }
            | LedgerDiscrepancy::OrphanTransaction { package_id, .. }
            | LedgerDiscrepancy::UnknownStudent { package_id, .. } => *package_id,
        }
    }
}

impl fmt::Display for LedgerDiscrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerDiscrepancy::BalanceMismatch {
                package_id,
                recorded_used,
                transaction_total,
            } => write!(
                f,
                "package {package_id}: {recorded_used} used but transactions total {transaction_total}"
            ),
            LedgerDiscrepancy::OutOfBounds {
                package_id,
                remaining,
                package_hours,
            } => write!(
                f,
                "package {package_id}: remaining {remaining} outside 0..={package_hours}"
            ),
            LedgerDiscrepancy::OrphanTransaction {
                transaction_id,
                package_id,
            } => write!(
                f,
                "transaction {transaction_id} references missing package {package_id}"
            ),
            LedgerDiscrepancy::UnknownStudent {
                package_id,
                student_id,
            } => write!(
                f,
                "package {package_id} belongs to unknown student {student_id}"
            ),
        }
    }
}

/// Checks the sum and bounds rules for every package, plus referential integrity.
pub fn audit_dataset(dataset: &Dataset) -> Vec<LedgerDiscrepancy> {
    let mut totals: HashMap<Uuid, Hours> = HashMap::new();
    let mut findings = Vec::new();

    for txn in &dataset.transactions {
        if dataset.package(txn.package_id).is_none() {
            findings.push(LedgerDiscrepancy::OrphanTransaction {
                transaction_id: txn.id,
                package_id: txn.package_id,
            });
            continue;
        }
        *totals.entry(txn.package_id).or_default() += txn.hours_deducted;
    }

    for package in &dataset.packages {
        if dataset.student(package.student_id).is_none() {
            findings.push(LedgerDiscrepancy::UnknownStudent {
                package_id: package.id,
                student_id: package.student_id,
            });
        }
        if !package.within_bounds(package.remaining_hours) {
            findings.push(LedgerDiscrepancy::OutOfBounds {
                package_id: package.id,
                remaining: package.remaining_hours,
                package_hours: package.package_hours,
            });
        }
        let transaction_total = totals.get(&package.id).copied().unwrap_or_default();
        if package.used_hours() != transaction_total {
            findings.push(LedgerDiscrepancy::BalanceMismatch {
                package_id: package.id,
                recorded_used: package.used_hours(),
                transaction_total,
            });
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use drivedesk_domain::{HourPackage, LedgerTransaction, Student};

    fn dataset_with_package() -> (Dataset, HourPackage) {
        let mut dataset = Dataset::new();
        let student = Student::new("Grace", Utc::now());
        let package = HourPackage::new(
            student.id,
            Hours::whole(10),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        );
        dataset.students.push(student);
        dataset.packages.push(package.clone());
        (dataset, package)
    }

    #[test]
    fn clean_ledger_has_no_findings() {
        let (mut dataset, package) = dataset_with_package();
        dataset.packages[0].remaining_hours = Hours::whole(9);
        dataset.transactions.push(LedgerTransaction::deduction(
            package.id,
            Uuid::new_v4(),
            Hours::whole(1),
            Utc::now(),
        ));
        assert!(audit_dataset(&dataset).is_empty());
    }

    #[test]
    fn drifted_balance_is_reported() {
        let (mut dataset, package) = dataset_with_package();
        dataset.packages[0].remaining_hours = Hours::whole(8);

        let findings = audit_dataset(&dataset);
        assert_eq!(
            findings,
            vec![LedgerDiscrepancy::BalanceMismatch {
                package_id: package.id,
                recorded_used: Hours::whole(2),
                transaction_total: Hours::ZERO,
            }]
        );
    }

    #[test]
    fn negative_balance_and_orphans_are_reported() {
        let (mut dataset, package) = dataset_with_package();
        dataset.packages[0].remaining_hours = -Hours::whole(1);
        let orphan = LedgerTransaction::deduction(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Hours::whole(1),
            Utc::now(),
        );
        dataset.transactions.push(orphan.clone());

        let findings = audit_dataset(&dataset);
        assert!(findings.contains(&LedgerDiscrepancy::OrphanTransaction {
            transaction_id: orphan.id,
            package_id: orphan.package_id,
        }));
        assert!(findings
            .iter()
            .any(|f| matches!(f, LedgerDiscrepancy::OutOfBounds { package_id, .. } if *package_id == package.id)));
    }
}
