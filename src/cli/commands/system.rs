use crate::cli::core::{CommandError, CommandResult};
use crate::cli::output;
use crate::cli::registry::{CommandEntry, CommandRegistry};
use crate::cli::shell_context::ShellContext;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "help",
            "Show available commands",
            "help [command]",
            cmd_help,
        ),
        CommandEntry::new(
            "config",
            "Show the active configuration",
            "config",
            cmd_config,
        ),
        CommandEntry::new(
            "backup",
            "Snapshot the data file",
            "backup [note]",
            cmd_backup,
        ),
        CommandEntry::new(
            "backups",
            "List data file backups, newest first",
            "backups",
            cmd_backups,
        ),
        CommandEntry::new(
            "restore",
            "Replace the data with a backup",
            "restore <number|file name>",
            cmd_restore,
        ),
        CommandEntry::new("exit", "Exit the shell", "exit", cmd_exit),
    ]
}

fn print_overview(registry: &CommandRegistry) {
    output::section("Available commands");
    for entry in registry.list() {
        output::info(format!("  {:<10} {}", entry.name, entry.description));
    }
    output::hint("Use `help <command>` for details.");
}

fn print_command(entry: &CommandEntry) {
    output::section(format!("Help: {}", entry.name));
    output::info(format!("  Description: {}", entry.description));
    output::info(format!("  Usage: {}", entry.usage));
}

fn cmd_help(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if let Some(name) = args.first() {
        match context.command(&name.to_lowercase()) {
            Some(entry) => print_command(entry),
            None => context.suggest_command(name),
        }
        return Ok(());
    }
    print_overview(&context.registry);
    Ok(())
}

fn cmd_config(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let config = context.backoffice.config();
    output::section("Configuration");
    match context.backoffice.data_path() {
        Some(path) => output::info(format!("  data file        : {}", path.display())),
        None => output::info("  data file        : (in memory)"),
    }
    output::info(format!("  package order    : {}", config.package_order));
    output::info(format!("  commit retries   : {}", config.commit_retries));
    output::info(format!("  backup retention : {}", config.backup_retention));
    output::info(format!(
        "  lesson minutes   : {}",
        config.default_lesson_minutes
    ));
    output::info(format!("  log filter       : {}", config.log_filter));
    output::info(format!("  colour           : {}", config.ui_color_enabled));
    Ok(())
}

fn cmd_backup(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let note = if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    };
    let backup = context.backoffice.backup(note.as_deref())?;
    output::success(format!("Backup written: {}", backup.id));
    Ok(())
}

fn cmd_backups(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let backups = context.backoffice.backups()?;
    if backups.is_empty() {
        output::info("No backups yet. Use `backup [note]` to create one.");
        return Ok(());
    }
    output::section("Backups");
    for (position, backup) in backups.iter().enumerate() {
        let created = backup
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown time".into());
        output::info(format!("  {:>2}. {}  ({created})", position + 1, backup.id));
    }
    Ok(())
}

fn cmd_restore(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [reference] = args else {
        return Err(CommandError::usage("restore <number|file name>"));
    };
    let restored = context.backoffice.restore(reference)?;
    output::success(format!("Restored data from {}", restored.id));
    Ok(())
}

fn cmd_exit(_context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    Err(CommandError::ExitRequested)
}
