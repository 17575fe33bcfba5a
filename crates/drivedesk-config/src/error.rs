use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration file is malformed: {0}")]
    Serde(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
