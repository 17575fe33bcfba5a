//! drivedesk-domain
//!
//! Pure domain records (Student, Booking, HourPackage, LedgerTransaction) and the
//! time arithmetic they rely on. No I/O, no storage, no services.

pub mod booking;
pub mod common;
pub mod dataset;
pub mod package;
pub mod plan;
pub mod student;
pub mod time;

pub use booking::*;
pub use common::*;
pub use dataset::*;
pub use package::*;
pub use plan::*;
pub use student::*;
pub use time::*;
