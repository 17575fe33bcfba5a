use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use drivedesk_core::{
    BackofficeStore, BookingGenerator, CoreError, FixedClock, HoursLedger, LedgerDiscrepancy,
    MemoryStore, StudentService,
};
use drivedesk_domain::{
    Booking, Dataset, Hours, LessonDuration, LessonTemplate, LessonType, RecurrencePlan, Student,
};

struct Fixture {
    store: Arc<MemoryStore>,
    ledger: HoursLedger,
    student: Student,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
    ));
    let student = StudentService::new(store.clone(), clock.clone())
        .register("Sophie", None, None)
        .unwrap();
    let ledger = HoursLedger::new(store.clone(), clock);
    Fixture {
        store,
        ledger,
        student,
    }
}

impl Fixture {
    fn booking(&self, day: u32) -> Booking {
        let template =
            LessonTemplate::new(self.student.id, LessonType::Lesson, LessonDuration::OneHour);
        let start = Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap();
        BookingGenerator::schedule(self.store.as_ref(), &template, &RecurrencePlan::single(start))
            .unwrap()
            .remove(0)
    }

    fn assert_balanced(&self) {
        let snapshot = self.store.snapshot().unwrap();
        for package in &snapshot.packages {
            let charged: Hours = snapshot
                .transactions_for_package(package.id)
                .map(|t| t.hours_deducted)
                .sum();
            assert_eq!(package.package_hours - package.remaining_hours, charged);
            assert!(package.within_bounds(package.remaining_hours));
        }
        assert!(self.ledger.audit().unwrap().is_empty());
    }
}

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

#[test]
fn sum_invariant_holds_through_a_deduction_sequence() {
    let f = fixture();
    let amounts = [45, 90, 30, 120, 60, 15, 75];
    f.ledger
        .create_package(f.student.id, Hours::whole(4), Some(180.0), Some(march(1)))
        .unwrap();
    f.assert_balanced();

    for (i, minutes) in amounts.iter().enumerate() {
        if i == 2 {
            f.ledger
                .create_package(f.student.id, Hours::whole(3), None, Some(march(2)))
                .unwrap();
        }
        let booking = f.booking(3 + i as u32);
        match f
            .ledger
            .deduct(f.student.id, booking.id, Hours::from_minutes(*minutes))
        {
            Ok(outcome) => {
                let total: Hours = outcome.transactions.iter().map(|t| t.hours_deducted).sum();
                assert_eq!(total, Hours::from_minutes(*minutes));
            }
            Err(CoreError::InsufficientHours { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
        f.assert_balanced();
    }
}

#[test]
fn two_and_five_minus_three_leaves_zero_and_four() {
    let f = fixture();
    let small = f
        .ledger
        .create_package(f.student.id, Hours::whole(2), None, Some(march(1)))
        .unwrap();
    let large = f
        .ledger
        .create_package(f.student.id, Hours::whole(5), None, Some(march(1)))
        .unwrap();
    let booking = f.booking(4);

    let outcome = f
        .ledger
        .deduct(f.student.id, booking.id, Hours::whole(3))
        .unwrap();

    assert_eq!(outcome.transactions.len(), 2);
    assert_eq!(outcome.transactions[0].package_id, small.id);
    assert_eq!(outcome.transactions[0].hours_deducted, Hours::whole(2));
    assert_eq!(outcome.transactions[1].package_id, large.id);
    assert_eq!(outcome.transactions[1].hours_deducted, Hours::whole(1));
    assert_eq!(
        f.store.package(small.id).unwrap().unwrap().remaining_hours,
        Hours::ZERO
    );
    assert_eq!(
        f.store.package(large.id).unwrap().unwrap().remaining_hours,
        Hours::whole(4)
    );
    f.assert_balanced();
}

#[test]
fn non_positive_deduction_is_rejected() {
    let f = fixture();
    f.ledger
        .create_package(f.student.id, Hours::whole(2), None, None)
        .unwrap();
    let booking = f.booking(5);
    for hours in [Hours::ZERO, -Hours::whole(1)] {
        assert!(matches!(
            f.ledger.deduct(f.student.id, booking.id, hours),
            Err(CoreError::Validation(_))
        ));
    }
    f.assert_balanced();
}

#[test]
fn student_without_packages_cannot_be_charged() {
    let f = fixture();
    let booking = f.booking(6);
    let err = f
        .ledger
        .deduct(f.student.id, booking.id, Hours::whole(1))
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InsufficientHours { available, .. } if available == Hours::ZERO
    ));
    assert_eq!(
        err.to_string(),
        "Not enough prepaid hours remaining: 1.00h needed, 0.00h available"
    );
}

#[test]
fn audit_flags_tampered_balances() {
    let f = fixture();
    let package = f
        .ledger
        .create_package(f.student.id, Hours::whole(5), None, None)
        .unwrap();
    let mut dataset: Dataset = f.store.snapshot().unwrap();
    dataset.packages[0].remaining_hours = Hours::whole(3);
    let tampered = HoursLedger::new(
        Arc::new(MemoryStore::from_dataset(dataset)),
        Arc::new(FixedClock::new(Utc::now())),
    );

    let findings = tampered.audit().unwrap();
    assert_eq!(
        findings,
        vec![LedgerDiscrepancy::BalanceMismatch {
            package_id: package.id,
            recorded_used: Hours::whole(2),
            transaction_total: Hours::ZERO,
        }]
    );
}
