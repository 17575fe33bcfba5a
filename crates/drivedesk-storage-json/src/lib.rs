use std::{
    cmp::Reverse,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, NaiveDateTime, Utc};
use drivedesk_core::{
    store::{self, BackofficeStore, ChangeSet},
    CoreError, CoreResult,
};
use drivedesk_domain::{
    Booking, Dataset, HourPackage, LedgerTransaction, Student, CURRENT_SCHEMA_VERSION,
};
use uuid::Uuid;

const DATA_EXTENSION: &str = "json";
const BACKUP_PREFIX: &str = "drivedesk";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S%3f";
const TMP_SUFFIX: &str = "tmp";
pub const DEFAULT_RETENTION: usize = 5;

/// A backup file of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub path: PathBuf,
}

/// File-backed store keeping the whole dataset in one JSON document.
///
/// Reads are served from memory. Every write is applied to a copy, saved
/// atomically, and only then made visible, so a failed save leaves both the
/// file and the in-memory state untouched.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    backups_dir: PathBuf,
    retention: usize,
    dataset: RwLock<Dataset>,
}

impl JsonFileStore {
    pub fn open(path: PathBuf, backups_dir: PathBuf) -> CoreResult<Self> {
        Self::open_with_retention(path, backups_dir, DEFAULT_RETENTION)
    }

    /// Loads the dataset at `path`, creating an empty one if the file is absent.
    pub fn open_with_retention(
        path: PathBuf,
        backups_dir: PathBuf,
        retention: usize,
    ) -> CoreResult<Self> {
        fs::create_dir_all(&backups_dir)?;
        let dataset = if path.exists() {
            load_dataset_from_path(&path)?
        } else {
            let fresh = Dataset::new();
            save_dataset_to_path(&fresh, &path)?;
            fresh
        };
        Ok(Self {
            path,
            backups_dir,
            retention: retention.max(1),
            dataset: RwLock::new(dataset),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a copy of the current dataset into the backups directory and
    /// prunes the oldest copies beyond the retention limit.
    pub fn backup(&self, note: Option<&str>) -> CoreResult<BackupInfo> {
        let dataset = self.read()?;
        let now = Utc::now();
        let mut stem = format!(
            "{}_{}",
            BACKUP_PREFIX,
            now.format(BACKUP_TIMESTAMP_FORMAT)
        );
        if let Some(label) = sanitize_backup_note(note) {
            stem.push('_');
            stem.push_str(&label);
        }
        let mut file_name = format!("{stem}.{DATA_EXTENSION}");
        let mut attempt = 1;
        while self.backups_dir.join(&file_name).exists() {
            attempt += 1;
            file_name = format!("{stem}_{attempt}.{DATA_EXTENSION}");
        }
        let path = self.backups_dir.join(&file_name);
        save_dataset_to_path(&dataset, &path)?;
        drop(dataset);
        self.prune_backups()?;
        Ok(BackupInfo {
            created_at: parse_backup_timestamp(&file_name),
            id: file_name,
            path,
        })
    }

    /// Backups, newest first.
    pub fn list_backups(&self) -> CoreResult<Vec<BackupInfo>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.backups_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DATA_EXTENSION) {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                entries.push(BackupInfo {
                    id: file_name.to_string(),
                    created_at: parse_backup_timestamp(file_name),
                    path: path.clone(),
                });
            }
        }
        entries.sort_by(|a, b| {
            Reverse(a.created_at)
                .cmp(&Reverse(b.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries)
    }

    /// Replaces the live dataset with the contents of `backup`.
    pub fn restore(&self, backup: &BackupInfo) -> CoreResult<()> {
        if !backup.path.exists() {
            return Err(CoreError::Persistence(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let restored = load_dataset_from_path(&backup.path)?;
        let mut guard = self.write()?;
        save_dataset_to_path(&restored, &self.path)?;
        *guard = restored;
        Ok(())
    }

    fn prune_backups(&self) -> CoreResult<()> {
        for entry in self.list_backups()?.into_iter().skip(self.retention) {
            let _ = fs::remove_file(entry.path);
        }
        Ok(())
    }

    fn mutate<T>(&self, change: impl FnOnce(&mut Dataset) -> CoreResult<T>) -> CoreResult<T> {
        let mut guard = self.write()?;
        let mut working = guard.clone();
        let result = change(&mut working)?;
        save_dataset_to_path(&working, &self.path)?;
        *guard = working;
        Ok(result)
    }

    fn read(&self) -> CoreResult<RwLockReadGuard<'_, Dataset>> {
        self.dataset
            .read()
            .map_err(|_| CoreError::Persistence("json store lock poisoned".into()))
    }

    fn write(&self) -> CoreResult<RwLockWriteGuard<'_, Dataset>> {
        self.dataset
            .write()
            .map_err(|_| CoreError::Persistence("json store lock poisoned".into()))
    }
}

impl BackofficeStore for JsonFileStore {
    fn student(&self, id: Uuid) -> CoreResult<Option<Student>> {
        Ok(self.read()?.student(id).cloned())
    }

    fn students(&self) -> CoreResult<Vec<Student>> {
        Ok(self.read()?.students.clone())
    }

    fn insert_student(&self, student: Student) -> CoreResult<()> {
        self.mutate(|dataset| store::insert_student(dataset, student))
    }

    fn update_student(&self, student: Student) -> CoreResult<()> {
        self.mutate(|dataset| store::update_student(dataset, student))
    }

    fn booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.read()?.booking(id).cloned())
    }

    fn bookings_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Booking>> {
        Ok(self.read()?.bookings_for(student_id).cloned().collect())
    }

    fn insert_bookings(&self, bookings: &[Booking]) -> CoreResult<()> {
        self.mutate(|dataset| store::insert_bookings(dataset, bookings))
    }

    fn package(&self, id: Uuid) -> CoreResult<Option<HourPackage>> {
        Ok(self.read()?.package(id).cloned())
    }

    fn packages_for_student(&self, student_id: Uuid) -> CoreResult<Vec<HourPackage>> {
        Ok(self.read()?.packages_for(student_id).cloned().collect())
    }

    fn insert_package(&self, package: HourPackage) -> CoreResult<()> {
        self.mutate(|dataset| store::insert_package(dataset, package))
    }

    fn transactions_for_booking(&self, booking_id: Uuid) -> CoreResult<Vec<LedgerTransaction>> {
        Ok(self
            .read()?
            .transactions_for_booking(booking_id)
            .cloned()
            .collect())
    }

    fn transactions_for_package(&self, package_id: Uuid) -> CoreResult<Vec<LedgerTransaction>> {
        Ok(self
            .read()?
            .transactions_for_package(package_id)
            .cloned()
            .collect())
    }

    fn snapshot(&self) -> CoreResult<Dataset> {
        Ok(self.read()?.clone())
    }

    fn apply(&self, change: ChangeSet) -> CoreResult<()> {
        self.mutate(|dataset| store::apply_change_set(dataset, change))
    }
}

/// Saves a dataset to an arbitrary path on disk via a temporary file and rename.
pub fn save_dataset_to_path(dataset: &Dataset, path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serialize_dataset(dataset)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a dataset, rejecting files written by a newer schema.
pub fn load_dataset_from_path(path: &Path) -> CoreResult<Dataset> {
    let data = fs::read_to_string(path)?;
    let dataset: Dataset = serde_json::from_str(&data).map_err(|err| {
        CoreError::Persistence(format!("{} is not a valid data file: {err}", path.display()))
    })?;
    if dataset.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(CoreError::Persistence(format!(
            "data file schema version {} is newer than supported version {}",
            dataset.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }
    Ok(dataset)
}

fn sanitize_backup_note(note: Option<&str>) -> Option<String> {
    let raw = note?.trim();
    let mut sanitized = String::new();
    let mut last_dash = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            sanitized.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !sanitized.is_empty() && !last_dash {
            sanitized.push('-');
            last_dash = true;
        }
    }
    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_backup_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let rest = name.strip_prefix(BACKUP_PREFIX)?.strip_prefix('_')?;
    let rest = rest.strip_suffix(&format!(".{DATA_EXTENSION}"))?;
    let mut segments = rest.split('_');
    let date = segments.next()?;
    let time = segments.next()?;
    if !is_digits(date, 8) || !is_digits(time, 9) {
        return None;
    }
    NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S%3f")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|c| c.is_ascii_digit())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> CoreResult<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn serialize_dataset(dataset: &Dataset) -> CoreResult<String> {
    serde_json::to_string_pretty(dataset).map_err(|err| CoreError::Persistence(err.to_string()))
}
