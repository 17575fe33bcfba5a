use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    booking_service::BookingLifecycle, ledger_service::HoursLedger, memory_store::MemoryStore,
    policy::NewestPurchaseFirst, recurrence_service::BookingGenerator, store::BackofficeStore,
    student_service::StudentService,
    time::{Clock, FixedClock},
    CoreError, RecordKind,
};
use drivedesk_domain::{
    Booking, BookingStatus, Cadence, DateWindow, HourPackage, Hours, LessonDuration,
    LessonTemplate, LessonType, RecurrencePlan, Student, StudentProfile, TransactionKind,
};

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    students: StudentService,
    ledger: HoursLedger,
    lifecycle: BookingLifecycle,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        ));
        let students = StudentService::new(store.clone(), clock.clone());
        let ledger = HoursLedger::new(store.clone(), clock.clone());
        let lifecycle = BookingLifecycle::new(ledger.clone());
        Self {
            store,
            clock,
            students,
            ledger,
            lifecycle,
        }
    }

    fn student(&self, name: &str) -> Student {
        self.students.register(name, None, None).expect("register student")
    }

    fn book(&self, student: &Student, start: DateTime<Utc>, duration: LessonDuration) -> Booking {
        let template = LessonTemplate::new(student.id, LessonType::Lesson, duration);
        let mut bookings = BookingGenerator::schedule(
            self.store.as_ref(),
            &template,
            &RecurrencePlan::single(start),
        )
        .expect("schedule lesson");
        bookings.remove(0)
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn nine_am(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap()
}

#[test]
fn completing_one_hour_lesson_leaves_nine_of_ten() {
    let h = Harness::new();
    let student = h.student("Ada");
    let package = h
        .ledger
        .create_package(student.id, Hours::whole(10), Some(450.0), None)
        .expect("create package");
    assert_eq!(package.purchase_date, h.clock.today());
    let booking = h.book(&student, nine_am(2), LessonDuration::OneHour);

    let outcome = h.lifecycle.complete(booking.id).expect("complete");

    assert_eq!(outcome.transactions.len(), 1);
    assert_eq!(outcome.transactions[0].hours_deducted, Hours::whole(1));
    assert_eq!(outcome.remaining_balance, Hours::whole(9));
    let stored = h.store.package(package.id).unwrap().unwrap();
    assert_eq!(stored.remaining_hours, Hours::whole(9));
    let booking = h.store.booking(booking.id).unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
}

#[test]
fn deduction_spans_packages_oldest_first() {
    let h = Harness::new();
    let student = h.student("Linus");
    let older = h
        .ledger
        .create_package(student.id, Hours::whole(2), None, Some(day(1)))
        .unwrap();
    let newer = h
        .ledger
        .create_package(student.id, Hours::whole(5), None, Some(day(2)))
        .unwrap();
    let booking = h.book(&student, nine_am(3), LessonDuration::OneHour);

    let outcome = h
        .ledger
        .deduct(student.id, booking.id, Hours::whole(3))
        .expect("deduct");

    let drawn: Vec<_> = outcome
        .transactions
        .iter()
        .map(|t| (t.package_id, t.hours_deducted))
        .collect();
    assert_eq!(
        drawn,
        vec![(older.id, Hours::whole(2)), (newer.id, Hours::whole(1))]
    );
    let balance = h.ledger.balance(student.id).unwrap();
    let remaining: Vec<_> = balance.packages.iter().map(|p| p.remaining_hours).collect();
    assert_eq!(remaining, vec![Hours::ZERO, Hours::whole(4)]);
    assert_eq!(balance.remaining, Hours::whole(4));
    assert_eq!(balance.used, Hours::whole(3));
}

#[test]
fn newest_first_policy_drains_latest_purchase() {
    let h = Harness::new();
    let ledger = h.ledger.clone().with_policy(NewestPurchaseFirst);
    let student = h.student("Barbara");
    let older = ledger
        .create_package(student.id, Hours::whole(2), None, Some(day(1)))
        .unwrap();
    let newer = ledger
        .create_package(student.id, Hours::whole(5), None, Some(day(2)))
        .unwrap();
    let booking = h.book(&student, nine_am(3), LessonDuration::OneHour);

    ledger
        .deduct(student.id, booking.id, Hours::whole(3))
        .unwrap();

    assert_eq!(ledger.policy_name(), "newest-first");
    assert_eq!(
        h.store.package(older.id).unwrap().unwrap().remaining_hours,
        Hours::whole(2)
    );
    assert_eq!(
        h.store.package(newer.id).unwrap().unwrap().remaining_hours,
        Hours::whole(2)
    );
}

#[test]
fn overdraw_changes_nothing() {
    let h = Harness::new();
    let student = h.student("Edsger");
    h.ledger
        .create_package(student.id, Hours::whole(1), None, None)
        .unwrap();
    let booking = h.book(&student, nine_am(2), LessonDuration::TwoHours);
    let before = h.store.snapshot().unwrap();

    let err = h.lifecycle.complete(booking.id).unwrap_err();

    match err {
        CoreError::InsufficientHours {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, Hours::whole(2));
            assert_eq!(available, Hours::whole(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let after = h.store.snapshot().unwrap();
    assert_eq!(after.packages, before.packages);
    assert_eq!(after.transactions, before.transactions);
    assert_eq!(
        h.store.booking(booking.id).unwrap().unwrap().status,
        BookingStatus::Scheduled
    );
}

#[test]
fn terminal_bookings_reject_further_transitions() {
    let h = Harness::new();
    let student = h.student("Margaret");
    h.ledger
        .create_package(student.id, Hours::whole(5), None, None)
        .unwrap();
    let done = h.book(&student, nine_am(2), LessonDuration::OneHour);
    let dropped = h.book(&student, nine_am(3), LessonDuration::OneHour);
    h.lifecycle.complete(done.id).unwrap();
    h.lifecycle.cancel(dropped.id).unwrap();
    let ledger_before = h.store.snapshot().unwrap().transactions;

    for (id, action) in [
        (done.id, "complete"),
        (done.id, "cancel"),
        (dropped.id, "complete"),
        (dropped.id, "cancel"),
    ] {
        let result = match action {
            "complete" => h.lifecycle.complete(id).map(|_| ()),
            _ => h.lifecycle.cancel(id).map(|_| ()),
        };
        assert!(
            matches!(result, Err(CoreError::InvalidTransition { booking_id, .. }) if booking_id == id),
            "{action} on terminal booking: {result:?}"
        );
    }
    assert_eq!(h.store.snapshot().unwrap().transactions, ledger_before);
}

#[test]
fn cancel_never_touches_the_ledger() {
    let h = Harness::new();
    let student = h.student("Barbara");
    h.ledger
        .create_package(student.id, Hours::whole(3), None, None)
        .unwrap();
    let booking = h.book(&student, nine_am(4), LessonDuration::NinetyMinutes);

    let cancelled = h.lifecycle.cancel(booking.id).expect("cancel");

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(h.store.transactions_for_booking(booking.id).unwrap().is_empty());
    assert_eq!(h.ledger.balance(student.id).unwrap().remaining, Hours::whole(3));
}

#[test]
fn unknown_ids_are_not_found() {
    let h = Harness::new();
    let missing = Uuid::new_v4();
    assert!(matches!(
        h.lifecycle.complete(missing),
        Err(CoreError::NotFound { kind: RecordKind::Booking, .. })
    ));
    assert!(matches!(
        h.ledger.create_package(missing, Hours::whole(1), None, None),
        Err(CoreError::NotFound { kind: RecordKind::Student, .. })
    ));
    let template = LessonTemplate::new(missing, LessonType::Test, LessonDuration::OneHour);
    assert!(matches!(
        BookingGenerator::schedule(h.store.as_ref(), &template, &RecurrencePlan::single(nine_am(5))),
        Err(CoreError::NotFound { kind: RecordKind::Student, .. })
    ));
}

#[test]
fn package_creation_validates_hours() {
    let h = Harness::new();
    let student = h.student("Niklaus");
    for hours in [Hours::ZERO, -Hours::whole(2)] {
        assert!(matches!(
            h.ledger.create_package(student.id, hours, None, None),
            Err(CoreError::Validation(_))
        ));
    }
    assert!(matches!(
        h.ledger
            .create_package(student.id, Hours::whole(1), Some(f64::NAN), None),
        Err(CoreError::Validation(_))
    ));

    h.clock.set(nine_am(20));
    let package = h
        .ledger
        .create_package(student.id, Hours::whole(1), None, None)
        .unwrap();
    assert_eq!(package.purchase_date, day(20));
}

#[test]
fn oversized_packages_are_refused_and_balances_stay_summable() {
    let h = Harness::new();
    let student = h.student("Edsger");
    let huge = Hours::from_hours(1e17).unwrap();
    for _ in 0..2 {
        assert!(matches!(
            h.ledger.create_package(student.id, huge, None, None),
            Err(CoreError::Validation(ref msg)) if msg.contains("at most")
        ));
    }
    for _ in 0..2 {
        h.ledger
            .create_package(student.id, HourPackage::MAX_HOURS, None, None)
            .unwrap();
    }

    let balance = h.ledger.balance(student.id).unwrap();
    assert_eq!(balance.packages.len(), 2);
    assert_eq!(balance.purchased, Hours::whole(20_000));
    assert_eq!(balance.remaining, Hours::whole(20_000));
}

#[test]
fn cancelled_booking_is_never_charged() {
    let h = Harness::new();
    let student = h.student("Leslie");
    h.ledger
        .create_package(student.id, Hours::whole(10), None, None)
        .unwrap();
    let booking = h.book(&student, nine_am(2), LessonDuration::OneHour);
    h.lifecycle.cancel(booking.id).unwrap();

    let err = h
        .ledger
        .deduct(student.id, booking.id, Hours::whole(1))
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            booking_id,
            from: BookingStatus::Cancelled,
            to: BookingStatus::Completed,
        } if booking_id == booking.id
    ));
    assert!(h.store.transactions_for_booking(booking.id).unwrap().is_empty());
    assert_eq!(h.ledger.balance(student.id).unwrap().remaining, Hours::whole(10));
    assert_eq!(
        h.store.booking(booking.id).unwrap().unwrap().status,
        BookingStatus::Cancelled
    );
}

#[test]
fn direct_deduction_completes_a_scheduled_booking() {
    let h = Harness::new();
    let student = h.student("Butler");
    h.ledger
        .create_package(student.id, Hours::whole(10), None, None)
        .unwrap();
    let booking = h.book(&student, nine_am(2), LessonDuration::OneHour);
    assert!(!booking.is_terminal());

    h.ledger
        .deduct(student.id, booking.id, Hours::whole(1))
        .unwrap();

    let stored = h.store.booking(booking.id).unwrap().unwrap();
    assert!(stored.is_terminal());
    assert_eq!(stored.status, BookingStatus::Completed);
    assert!(matches!(
        h.lifecycle.complete(booking.id),
        Err(CoreError::InvalidTransition { from: BookingStatus::Completed, .. })
    ));
    assert!(matches!(
        h.lifecycle.cancel(booking.id),
        Err(CoreError::InvalidTransition { from: BookingStatus::Completed, .. })
    ));
    assert_eq!(h.ledger.balance(student.id).unwrap().remaining, Hours::whole(9));
    assert!(h.ledger.audit().unwrap().is_empty());
}

#[test]
fn booking_is_charged_at_most_once() {
    let h = Harness::new();
    let student = h.student("Ken");
    h.ledger
        .create_package(student.id, Hours::whole(4), None, None)
        .unwrap();
    let booking = h.book(&student, nine_am(2), LessonDuration::OneHour);
    h.ledger
        .deduct(student.id, booking.id, Hours::whole(1))
        .unwrap();

    let err = h
        .ledger
        .deduct(student.id, booking.id, Hours::whole(1))
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateDeduction(id) if id == booking.id));
    assert_eq!(h.ledger.balance(student.id).unwrap().remaining, Hours::whole(3));
}

#[test]
fn refund_restores_each_package_it_drew_from() {
    let h = Harness::new();
    let student = h.student("Frances");
    let first = h
        .ledger
        .create_package(student.id, Hours::from_minutes(30), None, Some(day(1)))
        .unwrap();
    let second = h
        .ledger
        .create_package(student.id, Hours::whole(2), None, Some(day(2)))
        .unwrap();
    let booking = h.book(&student, nine_am(3), LessonDuration::NinetyMinutes);
    h.lifecycle.complete(booking.id).unwrap();
    h.clock.advance(Duration::days(2));

    let corrections = h.ledger.refund_booking(booking.id).expect("refund");

    assert_eq!(corrections.len(), 2);
    assert!(corrections
        .iter()
        .all(|t| t.transaction_date == h.clock.now()));
    assert_eq!(h.clock.now(), nine_am(3) - Duration::hours(1));
    assert!(corrections
        .iter()
        .all(|t| t.kind == TransactionKind::Correction && t.hours_deducted.is_negative()));
    assert_eq!(
        h.store.package(first.id).unwrap().unwrap().remaining_hours,
        Hours::from_minutes(30)
    );
    assert_eq!(
        h.store.package(second.id).unwrap().unwrap().remaining_hours,
        Hours::whole(2)
    );
    assert!(h.ledger.audit().unwrap().is_empty());
    assert!(matches!(
        h.ledger.refund_booking(booking.id),
        Err(CoreError::Validation(_))
    ));
    h.ledger
        .deduct(student.id, booking.id, Hours::whole(1))
        .expect("refunded booking can be charged again");
    assert_eq!(
        h.store.booking(booking.id).unwrap().unwrap().status,
        BookingStatus::Completed
    );
}

#[test]
fn ledger_stays_balanced_through_mixed_activity() {
    let h = Harness::new();
    let student = h.student("Donald");
    h.ledger
        .create_package(student.id, Hours::whole(3), None, Some(day(1)))
        .unwrap();
    let mut bookings = Vec::new();
    for d in 2..8 {
        bookings.push(h.book(&student, nine_am(d), LessonDuration::ThreeQuarters));
    }
    for (i, booking) in bookings.iter().enumerate() {
        if i == 3 {
            h.ledger
                .create_package(student.id, Hours::whole(1), None, Some(day(5)))
                .unwrap();
        }
        let _ = h.lifecycle.complete(booking.id);
        if i == 1 {
            h.ledger.refund_booking(booking.id).unwrap();
        }
        assert!(h.ledger.audit().unwrap().is_empty(), "after booking {i}");
    }

    let balance = h.ledger.balance(student.id).unwrap();
    let charged: Hours = h
        .store
        .snapshot()
        .unwrap()
        .transactions
        .iter()
        .map(|t| t.hours_deducted)
        .sum();
    assert_eq!(balance.purchased - balance.remaining, charged);
    assert!(balance.remaining >= Hours::ZERO);
}

#[test]
fn weekly_series_is_listed_in_window() {
    let h = Harness::new();
    let student = h.student("Radia");
    let template = LessonTemplate::new(student.id, LessonType::Lesson, LessonDuration::OneHour);
    let plan = RecurrencePlan::new(nine_am(1), Cadence::Weekly, 4).unwrap();
    BookingGenerator::schedule(h.store.as_ref(), &template, &plan).expect("schedule");

    let window = DateWindow::new(nine_am(5), nine_am(5) + Duration::days(14)).unwrap();
    let listed = h.lifecycle.bookings_for(student.id, window).unwrap();

    let starts: Vec<_> = listed.iter().map(|b| b.start_time).collect();
    assert_eq!(starts, vec![nine_am(8), nine_am(15)]);
}

#[test]
fn rescheduling_same_template_is_rejected() {
    let h = Harness::new();
    let student = h.student("Alan");
    let template = LessonTemplate::new(student.id, LessonType::Lesson, LessonDuration::OneHour);
    let plan = RecurrencePlan::new(nine_am(1), Cadence::Fortnightly, 3).unwrap();
    BookingGenerator::schedule(h.store.as_ref(), &template, &plan).unwrap();

    let err = BookingGenerator::schedule(h.store.as_ref(), &template, &plan).unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
    assert_eq!(h.store.bookings_for_student(student.id).unwrap().len(), 3);
}

#[test]
fn student_profile_updates_and_validation() {
    let h = Harness::new();
    assert!(matches!(
        h.students.register("   ", None, None),
        Err(CoreError::Validation(_))
    ));
    let student = h
        .students
        .register(" Grace ", Some("0123".into()), None)
        .unwrap();
    assert_eq!(student.display_name, "Grace");

    let updated = h
        .students
        .update_profile(
            student.id,
            StudentProfile {
                email: Some("grace@example.com".into()),
                phone: Some(String::new()),
                ..StudentProfile::default()
            },
        )
        .unwrap();
    assert_eq!(updated.email.as_deref(), Some("grace@example.com"));
    assert_eq!(updated.phone, None);
    assert_eq!(
        h.students.find_by_name("grace").unwrap().map(|s| s.id),
        Some(student.id)
    );
    assert!(matches!(
        h.students.update_profile(
            student.id,
            StudentProfile {
                display_name: Some(String::new()),
                ..StudentProfile::default()
            }
        ),
        Err(CoreError::Validation(_))
    ));
}
