#![doc(test(attr(deny(warnings))))]

//! DriveDesk is the back office of a driving instructor: students, recurring
//! lesson bookings, and the prepaid-hours ledger those lessons draw from.

pub mod backoffice;
pub mod cli;
pub mod clock;
pub mod errors;
pub mod utils;

pub use backoffice::Backoffice;
pub use clock::SystemClock;
pub use errors::CliError;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter.
pub fn init() {
    init_with_filter(utils::DEFAULT_LOG_FILTER);
}

/// Initializes global tracing once; later calls are ignored.
pub fn init_with_filter(directive: &str) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(directive);
        tracing::debug!("DriveDesk tracing initialized.");
    });
}
