use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::answers::CompletionPayload;
use crate::error::SinkError;

/// Destination for finished flow payloads.
pub trait ResponseSink: Send + Sync {
    fn submit(&self, payload: &CompletionPayload) -> Result<(), SinkError>;
}

/// Appends every payload to a pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored entries; an absent file reads as empty.
    pub fn entries(&self) -> Result<Vec<Value>, SinkError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&raw)? {
            Value::Array(entries) => Ok(entries),
            _ => Err(SinkError::NotAnArray {
                path: self.path.display().to_string(),
            }),
        }
    }
}

impl ResponseSink for JsonFileSink {
    fn submit(&self, payload: &CompletionPayload) -> Result<(), SinkError> {
        let mut entries = self.entries()?;
        entries.push(serde_json::to_value(payload)?);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let rendered = serde_json::to_string_pretty(&Value::Array(entries))?;
        fs::write(&self.path, rendered + "\n")?;
        tracing::debug!(path = %self.path.display(), "stored survey response");
        Ok(())
    }
}
