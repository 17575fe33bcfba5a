use drivedesk_domain::Hours;

use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::CommandEntry;
use crate::cli::shell_context::ShellContext;

use super::{parse_date, parse_hours};

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "package",
            "Record a prepaid hour package",
            "package add <student> <hours> [amount] [YYYY-MM-DD]",
            cmd_package,
        ),
        CommandEntry::new(
            "balance",
            "Show a student's prepaid hours",
            "balance <student>",
            cmd_balance,
        ),
        CommandEntry::new(
            "refund",
            "Return the hours charged for a completed lesson",
            "refund <student> <lesson number>",
            cmd_refund,
        ),
        CommandEntry::new(
            "audit",
            "Check every package against its ledger",
            "audit",
            cmd_audit,
        ),
    ]
}

fn cmd_package(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let usage = "package add <student> <hours> [amount] [YYYY-MM-DD]";
    let ["add", name, hours, rest @ ..] = args else {
        return Err(CommandError::usage(usage));
    };
    let (amount, date) = match rest {
        [] => (None, None),
        [amount] => (Some(parse_amount(amount)?), None),
        [amount, date] => (Some(parse_amount(amount)?), Some(parse_date(date)?)),
        _ => return Err(CommandError::usage(usage)),
    };
    let student = context.resolve_student(name)?;
    let hours = parse_hours(hours)?;
    let package = context
        .backoffice
        .ledger()
        .create_package(student.id, hours, amount, date)?;
    output::success(format!(
        "Added {} for {} (purchased {})",
        package.package_hours, student.display_name, package.purchase_date
    ));
    Ok(())
}

fn parse_amount(raw: &str) -> Result<f64, CommandError> {
    raw.parse::<f64>()
        .map_err(|_| CommandError::InvalidArguments(format!("`{raw}` is not an amount")))
}

fn cmd_balance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name] = args else {
        return Err(CommandError::usage("balance <student>"));
    };
    let student = context.resolve_student(name)?;
    let balance = context.backoffice.ledger().balance(student.id)?;

    output::section(format!("Balance: {}", student.display_name));
    output::info(format!("  Purchased : {}", balance.purchased));
    output::info(format!("  Used      : {}", balance.used));
    output::info(format!("  Remaining : {}", balance.remaining));
    if balance.packages.is_empty() {
        output::hint("No packages yet. Use `package add` to record a purchase.");
        return Ok(());
    }
    output::info(format!(
        "  Packages (drawn {}):",
        context.backoffice.ledger().policy_name()
    ));
    for package in &balance.packages {
        output::info(format!(
            "    {}  {:>8} of {:>8}",
            package.purchase_date,
            package.remaining_hours.to_string(),
            package.package_hours.to_string()
        ));
    }
    Ok(())
}

fn cmd_refund(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [name, position] = args else {
        return Err(CommandError::usage("refund <student> <lesson number>"));
    };
    let student = context.resolve_student(name)?;
    let booking = context.resolve_booking(&student, position)?;
    let corrections = context.backoffice.ledger().refund_booking(booking.id)?;
    let restored: Hours = corrections.iter().map(|txn| -txn.hours_deducted).sum();
    let remaining = context.backoffice.ledger().balance(student.id)?.remaining;
    output::success(format!(
        "Refunded {restored} to {} ({remaining} remaining)",
        student.display_name
    ));
    Ok(())
}

fn cmd_audit(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let findings = context.backoffice.ledger().audit()?;
    if findings.is_empty() {
        output::success("Ledger is consistent.");
        return Ok(());
    }
    for finding in &findings {
        output::warning(finding);
    }
    Err(CommandError::Message(format!(
        "{} ledger discrepancy(ies) found",
        findings.len()
    )))
}
