//! drivedesk-config
//!
//! Persistent operator preferences for DriveDesk.
//! Owns the Config data structure plus disk persistence helpers.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::{ConfigManager, CONFIG_FILE_NAME};
pub use model::{Config, PackageOrder, HOME_ENV};
