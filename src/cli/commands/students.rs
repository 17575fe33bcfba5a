use drivedesk_domain::StudentProfile;

use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;

const USAGE: &str = "student add <name> [phone] [email] | student list | student update <name> <name|phone|email> <value>";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "student",
        "Register, list and edit students",
        USAGE,
        cmd_student,
    )]
}

fn cmd_student(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some((action, rest)) = args.split_first() else {
        return Err(CommandError::usage(USAGE));
    };
    match action.to_lowercase().as_str() {
        "add" => add_student(context, rest),
        "list" => list_students(context),
        "update" => update_student(context, rest),
        _ => Err(CommandError::usage(USAGE)),
    }
}

fn add_student(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (name, phone, email) = match args {
        [name] => (*name, None, None),
        [name, phone] => (*name, Some(phone.to_string()), None),
        [name, phone, email] => (*name, Some(phone.to_string()), Some(email.to_string())),
        _ => return Err(CommandError::usage("student add <name> [phone] [email]")),
    };
    if context.backoffice.students().find_by_name(name)?.is_some() {
        return Err(CommandError::InvalidArguments(format!(
            "a student named `{}` already exists",
            name.trim()
        )));
    }
    let student = context.backoffice.students().register(name, phone, email)?;
    output::success(format!("Registered {}", student.display_name));
    Ok(())
}

fn list_students(context: &mut ShellContext) -> CommandResult {
    let students = context.backoffice.students().list()?;
    if students.is_empty() {
        output::info("No students yet. Use `student add <name>` to register one.");
        return Ok(());
    }
    output::section("Students");
    for student in students {
        let remaining = context
            .backoffice
            .ledger()
            .balance(student.id)?
            .remaining
            .to_string();
        let contact = [student.phone.as_deref(), student.email.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        output::info(format!(
            "  {:<24} {:>9} left  {}",
            student.display_name, remaining, contact
        ));
    }
    Ok(())
}

fn update_student(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name, field, value @ ..] = args else {
        return Err(CommandError::usage(
            "student update <name> <name|phone|email> <value>",
        ));
    };
    let student = context.resolve_student(name)?;
    let value = value.join(" ");
    let mut profile = StudentProfile::default();
    match field.to_lowercase().as_str() {
        "name" => {
            let taken = context
                .backoffice
                .students()
                .find_by_name(&value)?
                .is_some_and(|other| other.id != student.id);
            if taken {
                return Err(CommandError::InvalidArguments(format!(
                    "a student named `{}` already exists",
                    value.trim()
                )));
            }
            profile.display_name = Some(value);
        }
        "phone" => profile.phone = Some(value),
        "email" => profile.email = Some(value),
        other => {
            return Err(CommandError::InvalidArguments(format!(
                "`{other}` is not an editable field (name, phone, email)"
            )))
        }
    }
    let updated = context
        .backoffice
        .students()
        .update_profile(student.id, profile)?;
    output::success(format!("Updated {}", updated.display_name));
    Ok(())
}
