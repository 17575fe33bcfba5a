pub mod lessons;
pub mod packages;
pub mod students;
pub mod system;

use chrono::{NaiveDate, NaiveTime};
use drivedesk_domain::Hours;

use crate::cli::core::CommandError;
use crate::cli::registry::CommandRegistry;

pub(crate) fn register_all(registry: &mut CommandRegistry) {
    let definitions = system::definitions()
        .into_iter()
        .chain(students::definitions())
        .chain(packages::definitions())
        .chain(lessons::definitions());
    for entry in definitions {
        registry.register(entry);
    }
}

/// Parses decimal hours such as `10` or `1.5`.
pub(crate) fn parse_hours(raw: &str) -> Result<Hours, CommandError> {
    raw.parse::<f64>()
        .ok()
        .and_then(Hours::from_hours)
        .ok_or_else(|| CommandError::InvalidArguments(format!("`{raw}` is not a number of hours")))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        CommandError::InvalidArguments(format!("`{raw}` is not a date (expected YYYY-MM-DD)"))
    })
}

pub(crate) fn parse_time(raw: &str) -> Result<NaiveTime, CommandError> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
        CommandError::InvalidArguments(format!("`{raw}` is not a time (expected HH:MM)"))
    })
}

/// Splits `--flag value` pairs off the end of an argument list.
pub(crate) struct FlagArgs<'a> {
    pub positional: Vec<&'a str>,
    flags: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> FlagArgs<'a> {
    /// `switches` name flags that take no value.
    pub(crate) fn parse(args: &[&'a str], switches: &[&str]) -> Result<Self, CommandError> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = args.iter().copied();
        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix("--") else {
                positional.push(arg);
                continue;
            };
            if switches.contains(&name) {
                flags.push((name, None));
                continue;
            }
            let value = iter.next().ok_or_else(|| {
                CommandError::InvalidArguments(format!("`--{name}` needs a value"))
            })?;
            flags.push((name, Some(value)));
        }
        Ok(Self { positional, flags })
    }

    pub(crate) fn value(&self, name: &str) -> Option<&'a str> {
        self.flags
            .iter()
            .rev()
            .find(|(flag, _)| *flag == name)
            .and_then(|(_, value)| *value)
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.flags.iter().any(|(flag, _)| *flag == name)
    }

    /// Rejects flags outside `known`.
    pub(crate) fn expect_only(&self, known: &[&str]) -> Result<(), CommandError> {
        match self.flags.iter().find(|(flag, _)| !known.contains(flag)) {
            Some((flag, _)) => Err(CommandError::InvalidArguments(format!(
                "unknown option `--{flag}`"
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn number(&self, name: &str) -> Result<Option<u32>, CommandError> {
        self.value(name)
            .map(|raw| {
                raw.parse::<u32>().map_err(|_| {
                    CommandError::InvalidArguments(format!("`--{name}` expects a whole number"))
                })
            })
            .transpose()
    }
}
