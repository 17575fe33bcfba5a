use std::fs;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use drivedesk_domain::{Booking, BookingStatus, DateWindow, LessonRequest, LessonType, Student};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;

use super::{parse_date, parse_time, FlagArgs};

const BOOK_USAGE: &str = "book <student> <YYYY-MM-DD> <HH:MM> [--minutes N] [--type lesson|test|personal] [--repeat none|weekly|fortnightly] [--count N] [--notes text] [--targets text]";
const BOOK_FLAGS: [&str; 6] = ["minutes", "type", "repeat", "count", "notes", "targets"];
const LESSONS_USAGE: &str = "lessons <student> [--from YYYY-MM-DD] [--to YYYY-MM-DD] [--json]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "book",
            "Book a lesson or a repeating series (times in UTC)",
            BOOK_USAGE,
            cmd_book,
        ),
        CommandEntry::new(
            "lessons",
            "List a student's lessons, numbered for complete/cancel/refund",
            LESSONS_USAGE,
            cmd_lessons,
        ),
        CommandEntry::new(
            "complete",
            "Mark a lesson completed and charge its hours",
            "complete <student> <lesson number>",
            cmd_complete,
        ),
        CommandEntry::new(
            "cancel",
            "Cancel a scheduled lesson",
            "cancel <student> <lesson number>",
            cmd_cancel,
        ),
        CommandEntry::new(
            "import",
            "Book lessons from a JSON file",
            "import <file.json>",
            cmd_import,
        ),
    ]
}

fn cmd_book(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let flags = FlagArgs::parse(args, &[])?;
    flags.expect_only(&BOOK_FLAGS)?;
    let [name, date, time] = flags.positional.as_slice() else {
        return Err(CommandError::usage(BOOK_USAGE));
    };
    let student = context.resolve_student(name)?;
    let naive = parse_date(date)?.and_time(parse_time(time)?);
    let request = LessonRequest {
        student_id: student.id,
        start_time: Utc.from_utc_datetime(&naive),
        duration_minutes: flags
            .number("minutes")?
            .unwrap_or(context.backoffice.config().default_lesson_minutes),
        lesson_type: flags.value("type").map(str::to_string),
        cadence: flags.value("repeat").map(str::to_string),
        occurrence_count: flags.number("count")?,
        notes: flags.value("notes").map(str::to_string),
        targets: flags.value("targets").map(str::to_string),
    };
    let bookings = context.backoffice.schedule(&request)?;
    report_booked(&student, &bookings);
    Ok(())
}

fn report_booked(student: &Student, bookings: &[Booking]) {
    match bookings {
        [single] => output::success(format!(
            "Booked {} with {} on {}",
            single.lesson_type,
            student.display_name,
            single.start_time.format("%Y-%m-%d %H:%M")
        )),
        [first, .., last] => output::success(format!(
            "Booked {} lessons with {} from {} to {}",
            bookings.len(),
            student.display_name,
            first.start_time.format("%Y-%m-%d"),
            last.start_time.format("%Y-%m-%d")
        )),
        [] => {}
    }
}

/// One line of the `lessons` listing; also its `--json` shape.
#[derive(Debug, Serialize)]
struct LessonRow<'a> {
    number: usize,
    id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    minutes: i64,
    lesson_type: LessonType,
    status: BookingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    series_id: Option<Uuid>,
    occurrence_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<&'a str>,
}

impl<'a> LessonRow<'a> {
    fn new(number: usize, booking: &'a Booking) -> Self {
        Self {
            number,
            id: booking.id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            minutes: booking.duration().num_minutes(),
            lesson_type: booking.lesson_type,
            status: booking.status,
            series_id: booking.series_id,
            occurrence_index: booking.occurrence_index,
            notes: booking.notes.as_deref(),
            targets: booking.targets.as_deref(),
        }
    }
}

fn cmd_lessons(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let flags = FlagArgs::parse(args, &["json"])?;
    flags.expect_only(&["from", "to", "json"])?;
    let [name] = flags.positional.as_slice() else {
        return Err(CommandError::usage(LESSONS_USAGE));
    };
    let student = context.resolve_student(name)?;
    let window = listing_window(flags.value("from"), flags.value("to"))?;
    let bookings = context.student_bookings(&student)?;
    let rows: Vec<LessonRow<'_>> = bookings
        .iter()
        .enumerate()
        .filter(|(_, booking)| window.map_or(true, |w| w.contains(booking.start_time)))
        .map(|(index, booking)| LessonRow::new(index + 1, booking))
        .collect();

    if flags.has("json") {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        output::info(format!(
            "No lessons for {}. Use `book` to schedule one.",
            student.display_name
        ));
        return Ok(());
    }
    output::section(format!("Lessons: {}", student.display_name));
    for row in &rows {
        let series = if row.series_id.is_some() {
            format!("  #{} in series", row.occurrence_index + 1)
        } else {
            String::new()
        };
        output::info(format!(
            "  {:>3}. {}  {:>3} min  {:<8} {:<9}{series}",
            row.number,
            row.start_time.format("%a %Y-%m-%d %H:%M"),
            row.minutes,
            row.lesson_type.to_string(),
            row.status.to_string(),
        ));
    }
    Ok(())
}

fn listing_window(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<DateWindow>, CommandError> {
    if from.is_none() && to.is_none() {
        return Ok(None);
    }
    let start = match from {
        Some(raw) => midnight(parse_date(raw)?),
        None => DateTime::<Utc>::MIN_UTC,
    };
    let end = match to {
        Some(raw) => parse_date(raw)?
            .checked_add_days(Days::new(1))
            .map(midnight)
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
        None => DateTime::<Utc>::MAX_UTC,
    };
    DateWindow::new(start, end)
        .map(Some)
        .map_err(|err| CommandError::InvalidArguments(err.to_string()))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn cmd_complete(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name, position] = args else {
        return Err(CommandError::usage("complete <student> <lesson number>"));
    };
    let student = context.resolve_student(name)?;
    let booking = context.resolve_booking(&student, position)?;
    let outcome = context.backoffice.lifecycle().complete(booking.id)?;
    output::success(format!(
        "Completed {} on {}: charged {} ({} remaining)",
        booking.lesson_type,
        booking.start_time.format("%Y-%m-%d %H:%M"),
        outcome.hours_deducted,
        outcome.remaining_balance
    ));
    Ok(())
}

fn cmd_cancel(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name, position] = args else {
        return Err(CommandError::usage("cancel <student> <lesson number>"));
    };
    let student = context.resolve_student(name)?;
    let booking = context.resolve_booking(&student, position)?;
    let cancelled = context.backoffice.lifecycle().cancel(booking.id)?;
    output::success(format!(
        "Cancelled {} on {}",
        cancelled.lesson_type,
        cancelled.start_time.format("%Y-%m-%d %H:%M")
    ));
    Ok(())
}

/// A lesson request keyed by student name, as read by `import`.
#[derive(Debug, Deserialize)]
struct LessonImport {
    student: String,
    start_time: DateTime<Utc>,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    lesson_type: Option<String>,
    #[serde(default)]
    cadence: Option<String>,
    #[serde(default)]
    occurrence_count: Option<u32>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    targets: Option<String>,
}

fn cmd_import(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [path] = args else {
        return Err(CommandError::usage("import <file.json>"));
    };
    let rows: Vec<LessonImport> = serde_json::from_str(&fs::read_to_string(path)?)?;
    let default_minutes = context.backoffice.config().default_lesson_minutes;

    let mut booked = 0usize;
    let mut failed = 0usize;
    for (index, row) in rows.into_iter().enumerate() {
        let result = context.resolve_student(&row.student).and_then(|student| {
            let request = LessonRequest {
                student_id: student.id,
                start_time: row.start_time,
                duration_minutes: row.duration_minutes.unwrap_or(default_minutes),
                lesson_type: row.lesson_type,
                cadence: row.cadence,
                occurrence_count: row.occurrence_count,
                notes: row.notes,
                targets: row.targets,
            };
            Ok(context.backoffice.schedule(&request)?)
        });
        match result {
            Ok(bookings) => booked += bookings.len(),
            Err(err) => {
                failed += 1;
                output::error(format!("row {}: {err}", index + 1));
            }
        }
    }

    if failed > 0 {
        return Err(CommandError::Message(format!(
            "imported {booked} lesson(s); {failed} row(s) rejected"
        )));
    }
    output::success(format!("Imported {booked} lesson(s)"));
    Ok(())
}
