#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, TimeZone, Utc};
use drivedesk::Backoffice;
use drivedesk_config::Config;
use drivedesk_core::FixedClock;
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// A fresh directory that outlives the calling test.
pub fn temp_home() -> PathBuf {
    let temp = TempDir::new().expect("create temp dir");
    let path = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);
    path
}

pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(monday_morning()))
}

/// A back office persisted under its own temporary home.
pub fn file_backoffice() -> (Backoffice, PathBuf) {
    let home = temp_home();
    let backoffice =
        Backoffice::open(&home, Config::default(), fixed_clock()).expect("open back office");
    (backoffice, home)
}
