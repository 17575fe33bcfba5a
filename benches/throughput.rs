use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use drivedesk_core::{
    BackofficeStore, BookingGenerator, BookingLifecycle, FixedClock, HoursLedger, MemoryStore,
};
use drivedesk_domain::{
    Cadence, Dataset, Hours, HourPackage, LessonDuration, LessonTemplate, LessonType,
    RecurrencePlan, Student,
};
use drivedesk_storage_json::{load_dataset_from_path, save_dataset_to_path};
use tempfile::tempdir;

fn bench_generation(c: &mut Criterion) {
    let student = Student::new("Bench", Utc::now());
    let template =
        LessonTemplate::new(student.id, LessonType::Lesson, LessonDuration::NinetyMinutes);
    let anchor = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
    let plan = RecurrencePlan::new(anchor, Cadence::Weekly, 12).expect("plan");

    c.bench_function("generate_weekly_12", |b| {
        b.iter(|| {
            let bookings: Vec<_> = BookingGenerator::generate(black_box(&template), &plan)
                .expect("generate")
                .collect();
            black_box(bookings);
        })
    });
}

/// A store with one student, `lessons` weekly one-hour bookings and a
/// package large enough to pay for them all.
fn seeded(lessons: u32) -> (Arc<MemoryStore>, BookingLifecycle, Vec<uuid::Uuid>) {
    let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
    let store = Arc::new(MemoryStore::new());
    let student = Student::new("Bench", start);
    store.insert_student(student.clone()).expect("student");
    store
        .insert_package(HourPackage::new(
            student.id,
            Hours::whole(i64::from(lessons)),
            start.date_naive(),
        ))
        .expect("package");

    let template =
        LessonTemplate::new(student.id, LessonType::Lesson, LessonDuration::OneHour);
    let mut ids = Vec::new();
    for block in 0..lessons.div_ceil(12) {
        let anchor = start + Duration::weeks(i64::from(block) * 12);
        let count = (lessons - block * 12).min(12);
        let plan = RecurrencePlan::new(anchor, Cadence::Weekly, count).expect("plan");
        let bookings =
            BookingGenerator::schedule(store.as_ref(), &template, &plan).expect("schedule");
        ids.extend(bookings.into_iter().map(|booking| booking.id));
    }

    let clock = Arc::new(FixedClock::new(start));
    let ledger = HoursLedger::new(store.clone(), clock);
    (store, BookingLifecycle::new(ledger), ids)
}

fn bench_completion(c: &mut Criterion) {
    c.bench_function("complete_48_lessons", |b| {
        b.iter_batched(
            || seeded(48),
            |(_store, lifecycle, ids)| {
                for id in ids {
                    lifecycle.complete(id).expect("complete");
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_dataset_io(c: &mut Criterion) {
    let (store, lifecycle, ids) = seeded(240);
    for id in ids.iter().step_by(2) {
        lifecycle.complete(*id).expect("complete");
    }
    let dataset: Dataset = store.snapshot().expect("snapshot");
    let dir = tempdir().expect("tempdir");
    let file_path = dir.path().join("drivedesk.json");

    c.bench_function("dataset_save_240", |b| {
        b.iter(|| save_dataset_to_path(&dataset, &file_path).expect("save"))
    });

    save_dataset_to_path(&dataset, &file_path).expect("seed");

    c.bench_function("dataset_load_240", |b| {
        b.iter(|| black_box(load_dataset_from_path(&file_path).expect("load")))
    });
}

criterion_group!(benches, bench_generation, bench_completion, bench_dataset_io);
criterion_main!(benches);
