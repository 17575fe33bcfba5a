//! Shared runtime state for CLI interactions and command execution.

use std::sync::Arc;

use dialoguer::{theme::ColorfulTheme, Confirm};
use drivedesk_config::{Config, ConfigManager};
use drivedesk_domain::{Booking, Student};
use strsim::levenshtein;

use super::{
    commands,
    core::{CommandError, LoopControl},
    output::{self, OutputPreferences},
    registry::{CommandEntry, CommandRegistry},
};
use crate::{Backoffice, CliError, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub backoffice: Backoffice,
    pub theme: ColorfulTheme,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    /// Loads config from the DriveDesk home and opens its data file.
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let home = Config::home_dir();
        let config = ConfigManager::with_base_dir(home.clone())?.load()?;
        crate::init_with_filter(&config.log_filter);
        output::set_preferences(OutputPreferences {
            color_enabled: config.ui_color_enabled && mode == CliMode::Interactive,
        });
        let backoffice = Backoffice::open(&home, config, Arc::new(SystemClock))?;
        Ok(Self::with_backoffice(mode, backoffice))
    }

    pub fn with_backoffice(mode: CliMode, backoffice: Backoffice) -> Self {
        let mut registry = CommandRegistry::new();
        commands::register_all(&mut registry);
        Self {
            mode,
            registry,
            backoffice,
            theme: ColorfulTheme::default(),
            last_command: None,
            running: true,
        }
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.registry.get(name)
    }

    pub fn prompt(&self) -> String {
        "drivedesk> ".to_string()
    }

    pub fn print_banner(&self) {
        output::section("DriveDesk");
        if let Some(path) = self.backoffice.data_path() {
            output::info(format!("Data file: {}", path.display()));
        }
        output::hint("Type `help` to list commands, `exit` to leave.");
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        if let Some(handler) = self.registry.handler(command) {
            match handler(self, args) {
                Ok(()) => Ok(LoopControl::Continue),
                Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
                Err(err) => Err(err),
            }
        } else {
            self.suggest_command(raw);
            Ok(LoopControl::Continue)
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{input}`. Type `help` to see available commands."
        ));

        let needle = input.to_lowercase();
        let best = self
            .registry
            .names()
            .map(|name| (levenshtein(name, &needle), name))
            .min_by_key(|(distance, _)| *distance);

        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::info(format!("Suggestion: `{name}`?"));
            }
        }
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt("Exit DriveDesk?")
            .default(true)
            .interact()?)
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            other => output::error(other),
        }
    }

    /// Finds a student by display name, ignoring case.
    pub(crate) fn resolve_student(&self, name: &str) -> Result<Student, CommandError> {
        self.backoffice
            .students()
            .find_by_name(name)?
            .ok_or_else(|| {
                CommandError::InvalidArguments(format!(
                    "No student named `{name}`. Use `student list` to see who is registered."
                ))
            })
    }

    /// A student's bookings in the order `lessons` numbers them.
    pub(crate) fn student_bookings(&self, student: &Student) -> Result<Vec<Booking>, CommandError> {
        Ok(self
            .backoffice
            .lifecycle()
            .all_bookings_for(student.id)?)
    }

    /// Resolves a 1-based position from the `lessons` listing.
    pub(crate) fn resolve_booking(
        &self,
        student: &Student,
        position: &str,
    ) -> Result<Booking, CommandError> {
        let index: usize = position.parse().map_err(|_| {
            CommandError::InvalidArguments(format!(
                "`{position}` is not a lesson number; see `lessons {}`",
                student.display_name
            ))
        })?;
        let mut bookings = self.student_bookings(student)?;
        if index == 0 || index > bookings.len() {
            return Err(CommandError::InvalidArguments(format!(
                "{} has {} lesson(s); `{index}` is out of range",
                student.display_name,
                bookings.len()
            )));
        }
        Ok(bookings.swap_remove(index - 1))
    }
}
