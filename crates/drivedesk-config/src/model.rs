use serde::{de::Deserializer, Deserialize, Serialize};
use std::{
    env, fmt,
    path::{Path, PathBuf},
};

use crate::ConfigError;

/// Environment variable overriding the DriveDesk home directory.
pub const HOME_ENV: &str = "DRIVEDESK_HOME";

/// Operator preferences persisted as `config.json` in the DriveDesk home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Directory holding the data file. Defaults to `<home>/data`.
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,
    #[serde(default = "Config::default_commit_retries")]
    pub commit_retries: u32,
    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,
    #[serde(default = "Config::default_lesson_minutes")]
    pub default_lesson_minutes: u32,
    #[serde(default)]
    pub package_order: PackageOrder,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            backup_dir: None,
            backup_retention: Self::default_backup_retention(),
            commit_retries: Self::default_commit_retries(),
            log_filter: Self::default_log_filter(),
            default_lesson_minutes: Self::default_lesson_minutes(),
            package_order: PackageOrder::default(),
            ui_color_enabled: Self::default_ui_color_enabled(),
        }
    }
}

impl Config {
    pub fn default_backup_retention() -> usize {
        5
    }

    pub fn default_commit_retries() -> u32 {
        8
    }

    pub fn default_log_filter() -> String {
        "drivedesk=info".into()
    }

    pub fn default_lesson_minutes() -> u32 {
        60
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    /// `$DRIVEDESK_HOME`, else `~/.drivedesk`, else `./.drivedesk`.
    pub fn home_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            return PathBuf::from(custom);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".drivedesk")
    }

    pub fn resolve_data_dir(&self, home: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| home.join("data"))
    }

    pub fn resolve_backup_dir(&self, home: &Path) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| home.join("backups"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_retries == 0 {
            return Err(ConfigError::Invalid(
                "commit_retries must be at least 1".into(),
            ));
        }
        if self.backup_retention == 0 {
            return Err(ConfigError::Invalid(
                "backup_retention must be at least 1".into(),
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".into()));
        }
        Ok(())
    }
}

/// Which prepaid package a deduction draws from first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageOrder {
    #[default]
    Oldest,
    Newest,
}

impl PackageOrder {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" | "newest-first" => PackageOrder::Newest,
            _ => PackageOrder::Oldest,
        }
    }
}

impl fmt::Display for PackageOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PackageOrder::Oldest => "oldest",
            PackageOrder::Newest => "newest",
        };
        f.write_str(label)
    }
}

impl<'de> Deserialize<'de> for PackageOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value
            .map(|v| PackageOrder::from_str(&v))
            .unwrap_or_default())
    }
}
