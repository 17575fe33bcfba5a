//! drivedesk-core
//!
//! Scheduling and prepaid-hours services for DriveDesk.
//! Depends on drivedesk-domain. No CLI, no terminal I/O; persistence goes
//! through the [`BackofficeStore`] seam.

pub mod audit;
pub mod booking_service;
pub mod error;
pub mod ledger_service;
pub mod memory_store;
pub mod policy;
pub mod recurrence_service;
pub mod store;
pub mod student_service;
pub mod time;

pub use audit::*;
pub use booking_service::*;
pub use error::{CoreError, CoreResult, RecordKind};
pub use ledger_service::*;
pub use memory_store::MemoryStore;
pub use policy::*;
pub use recurrence_service::*;
pub use store::{BackofficeStore, ChangeSet, PackageUpdate, StatusChange};
pub use student_service::*;
pub use time::{Clock, FixedClock};

#[cfg(test)]
mod tests;
