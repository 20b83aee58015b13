//! Progress persistence: a versioned snapshot written to a durable slot after
//! every navigation step and read back once at start.
//!
//! Nothing here ever fails the flow. Unreadable, stale or already completed
//! snapshots are treated as absent and storage errors are logged.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SlotError;

/// Serialized progress of one flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub current_index: usize,
    #[serde(default)]
    pub data_by_key: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durations_by_key: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Durable string storage keyed by name.
pub trait StateSlot: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError>;
    fn write(&self, key: &str, blob: &str) -> Result<(), SlotError>;
    fn remove(&self, key: &str) -> Result<(), SlotError>;
}

/// In-process slot.
#[derive(Debug, Default)]
pub struct MemorySlot {
    entries: DashMap<String, String>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), SlotError> {
        self.entries.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Bytes outside `[A-Za-z0-9._-]` are
    /// percent-encoded, so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, SlotError> {
        let name = utf8_percent_encode(key, FILE_NAME).to_string();
        if name.trim_matches('.').is_empty() {
            return Err(SlotError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

impl StateSlot for FileSlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), SlotError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(path, blob)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// What a usable snapshot contributes to a fresh run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredProgress {
    /// Clamped index to resume at; `None` when resuming is disabled.
    pub index: Option<usize>,
    pub data_by_key: BTreeMap<String, Value>,
    pub durations_by_key: BTreeMap<String, u64>,
}

/// Binds a slot, a key and a snapshot version.
#[derive(Clone)]
pub struct Persistence {
    slot: Option<Arc<dyn StateSlot>>,
    key: Option<String>,
    version: String,
    resume: bool,
}

impl Persistence {
    pub fn new(
        slot: Option<Arc<dyn StateSlot>>,
        key: Option<String>,
        version: impl Into<String>,
        resume: bool,
    ) -> Self {
        Self {
            slot,
            key,
            version: version.into(),
            resume,
        }
    }

    /// Persistence that stores nothing.
    pub fn disabled() -> Self {
        Self::new(None, None, "v1", false)
    }

    pub fn is_enabled(&self) -> bool {
        self.slot.is_some() && self.key.is_some()
    }

    fn target(&self) -> Option<(&dyn StateSlot, &str)> {
        Some((self.slot.as_deref()?, self.key.as_deref()?))
    }

    /// Reads the stored snapshot for a flow of `total` pages.
    pub fn restore(&self, total: usize) -> Option<RestoredProgress> {
        let (slot, key) = self.target()?;
        let blob = match slot.read(key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%key, %err, "could not read saved progress");
                return None;
            }
        };
        let snapshot: Snapshot = match serde_json::from_str(&blob) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(%key, %err, "ignoring unreadable saved progress");
                return None;
            }
        };
        if snapshot.version != self.version {
            tracing::warn!(
                %key,
                found = %snapshot.version,
                expected = %self.version,
                "ignoring saved progress from another version"
            );
            return None;
        }
        if snapshot.completed == Some(true) {
            tracing::debug!(%key, "discarding progress of a completed run");
            self.clear();
            return None;
        }
        let index = self
            .resume
            .then(|| snapshot.current_index.min(total.saturating_sub(1)));
        Some(RestoredProgress {
            index,
            data_by_key: snapshot.data_by_key,
            durations_by_key: snapshot.durations_by_key.unwrap_or_default(),
        })
    }

    pub fn snapshot(
        &self,
        current_index: usize,
        data_by_key: &BTreeMap<String, Value>,
        durations_by_key: &BTreeMap<String, u64>,
    ) -> Snapshot {
        Snapshot {
            version: self.version.clone(),
            current_index,
            data_by_key: data_by_key.clone(),
            durations_by_key: Some(durations_by_key.clone()),
            completed: None,
        }
    }

    pub fn persist(&self, snapshot: &Snapshot) {
        let Some((slot, key)) = self.target() else {
            return;
        };
        let blob = match serde_json::to_string(snapshot) {
            Ok(blob) => blob,
            Err(err) => {
                tracing::warn!(%key, %err, "could not encode progress");
                return;
            }
        };
        if let Err(err) = slot.write(key, &blob) {
            tracing::warn!(%key, %err, "could not save progress");
        }
    }

    pub fn clear(&self) {
        let Some((slot, key)) = self.target() else {
            return;
        };
        if let Err(err) = slot.remove(key) {
            tracing::warn!(%key, %err, "could not clear saved progress");
        }
    }
}
