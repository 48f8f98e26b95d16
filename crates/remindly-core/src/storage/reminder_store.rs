//! Reminder persistence.
//!
//! [`JsonFileStore`] keeps one pretty-printed JSON file per reminder under
//! `<data dir>/reminders/<id>.json`. Writes go through a temp file and a
//! rename so a crash never leaves a half-written reminder behind.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::data_dir;
use crate::collaborators::ReminderStore;
use crate::error::{Result, StorageError};
use crate::reminder::{Reminder, ReminderId};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Write {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Open the store under the default data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(data_dir()?.join("reminders"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: ReminderId) -> PathBuf {
        self.dir.join(format!("{}.json", id.value()))
    }

    fn read_file(path: &Path) -> Result<Reminder> {
        let content = std::fs::read_to_string(path).map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let reminder = serde_json::from_str(&content).map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(reminder)
    }
}

impl ReminderStore for JsonFileStore {
    fn load(&self, id: ReminderId) -> Result<Option<Reminder>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let reminder = Self::read_file(&path)?;
        // A reused slot holding a different reminder is not this one.
        Ok(Some(reminder).filter(|r| r.id() == id))
    }

    fn save(&self, reminder: &Reminder) -> Result<()> {
        let path = self.path_for(reminder.id());
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(reminder)?;
        let write_err = |source| StorageError::Write {
            path: path.clone(),
            source,
        };
        std::fs::write(&tmp, content).map_err(write_err)?;
        std::fs::rename(&tmp, &path).map_err(write_err)?;
        Ok(())
    }

    fn delete(&self, id: ReminderId) -> Result<()> {
        let path = self.path_for(id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Write { path, source }.into()),
        }
    }

    fn load_all(&self) -> Result<Vec<Reminder>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StorageError::Read {
            path: self.dir.clone(),
            source,
        })?;

        let mut reminders = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_file(&path) {
                Ok(reminder) => reminders.push(reminder),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable reminder"),
            }
        }
        reminders.sort_by(Reminder::schedule_cmp);
        Ok(reminders)
    }
}

/// Volatile store for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reminders: Mutex<BTreeMap<u32, Reminder>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reminders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReminderStore for MemoryStore {
    fn load(&self, id: ReminderId) -> Result<Option<Reminder>> {
        let reminders = self.reminders.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(reminders.get(&id.value()).filter(|r| r.id() == id).cloned())
    }

    fn save(&self, reminder: &Reminder) -> Result<()> {
        self.reminders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reminder.id().value(), reminder.clone());
        Ok(())
    }

    fn delete(&self, id: ReminderId) -> Result<()> {
        let mut reminders = self.reminders.lock().unwrap_or_else(PoisonError::into_inner);
        if reminders.get(&id.value()).is_some_and(|r| r.id() == id) {
            reminders.remove(&id.value());
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Reminder>> {
        let reminders = self.reminders.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Reminder> = reminders.values().cloned().collect();
        all.sort_by(Reminder::schedule_cmp);
        Ok(all)
    }
}
