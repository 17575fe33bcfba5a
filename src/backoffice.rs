//! Wires the store, clock and services together for one DriveDesk home.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use drivedesk_config::{Config, PackageOrder};
use drivedesk_core::{
    BackofficeStore, BookingGenerator, BookingLifecycle, Clock, CoreResult, HoursLedger,
    MemoryStore, NewestPurchaseFirst, StudentService,
};
use drivedesk_domain::{Booking, LessonRequest};
use drivedesk_storage_json::{BackupInfo, JsonFileStore};
use tracing::info;

use crate::CliError;

pub const DATA_FILE_NAME: &str = "drivedesk.json";

/// The services an operator works with, bound to one store.
pub struct Backoffice {
    store: Arc<dyn BackofficeStore>,
    file_store: Option<Arc<JsonFileStore>>,
    students: StudentService,
    ledger: HoursLedger,
    lifecycle: BookingLifecycle,
    config: Config,
}

impl Backoffice {
    /// Opens (or creates) the JSON data file under `home` as configured.
    pub fn open(home: &Path, config: Config, clock: Arc<dyn Clock>) -> Result<Self, CliError> {
        let data_path = config.resolve_data_dir(home).join(DATA_FILE_NAME);
        let store = Arc::new(JsonFileStore::open_with_retention(
            data_path.clone(),
            config.resolve_backup_dir(home),
            config.backup_retention,
        )?);
        info!(path = %data_path.display(), "opened data file");
        Ok(Self::assemble(store.clone(), Some(store), clock, config))
    }

    /// A throwaway back office kept entirely in memory.
    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self::assemble(Arc::new(MemoryStore::new()), None, clock, config)
    }

    fn assemble(
        store: Arc<dyn BackofficeStore>,
        file_store: Option<Arc<JsonFileStore>>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        let ledger = HoursLedger::new(store.clone(), clock.clone())
            .with_max_attempts(config.commit_retries);
        let ledger = match config.package_order {
            PackageOrder::Oldest => ledger,
            PackageOrder::Newest => ledger.with_policy(NewestPurchaseFirst),
        };
        Self {
            students: StudentService::new(store.clone(), clock),
            lifecycle: BookingLifecycle::new(ledger.clone()),
            ledger,
            store,
            file_store,
            config,
        }
    }

    pub fn students(&self) -> &StudentService {
        &self.students
    }

    pub fn ledger(&self) -> &HoursLedger {
        &self.ledger
    }

    pub fn lifecycle(&self) -> &BookingLifecycle {
        &self.lifecycle
    }

    pub fn store(&self) -> &Arc<dyn BackofficeStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_path(&self) -> Option<PathBuf> {
        self.file_store
            .as_ref()
            .map(|store| store.path().to_path_buf())
    }

    /// Validates a lesson request and stores the bookings it expands to.
    pub fn schedule(&self, request: &LessonRequest) -> CoreResult<Vec<Booking>> {
        let (template, plan) = request.validate()?;
        BookingGenerator::schedule(self.store.as_ref(), &template, &plan)
    }

    pub fn backup(&self, note: Option<&str>) -> Result<BackupInfo, CliError> {
        Ok(self.file_store()?.backup(note)?)
    }

    /// Backups of the data file, newest first.
    pub fn backups(&self) -> Result<Vec<BackupInfo>, CliError> {
        Ok(self.file_store()?.list_backups()?)
    }

    /// Restores the backup whose file name is `reference`, or the
    /// `reference`-th entry of [`Backoffice::backups`] when it is a number.
    pub fn restore(&self, reference: &str) -> Result<BackupInfo, CliError> {
        let store = self.file_store()?;
        let backups = store.list_backups()?;
        let chosen = match reference.parse::<usize>() {
            Ok(position) if position >= 1 => backups.get(position - 1),
            _ => backups.iter().find(|backup| backup.id == reference),
        }
        .cloned()
        .ok_or_else(|| CliError::Command(format!("no backup matches `{reference}`")))?;
        store.restore(&chosen)?;
        info!(backup = %chosen.id, "dataset restored from backup");
        Ok(chosen)
    }

    fn file_store(&self) -> Result<&JsonFileStore, CliError> {
        self.file_store.as_deref().ok_or_else(|| {
            CliError::Command("backups need a data file; this session is in memory".into())
        })
    }
}
