//! Durable path -> FileRecord store
//!
//! All reads and writes go through one async mutex, so concurrent workers
//! updating distinct files cannot corrupt the map, and `save` serializes a
//! consistent snapshot. The file is rewritten via temp file + rename so a
//! crash mid-save never leaves a torn state file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{FileRecord, FileStatus};

/// On-disk shape of the state file
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    files: HashMap<String, FileRecord>,
}

/// Durable mapping of watched-file path to its delivery record
pub struct StateStore {
    path: PathBuf,
    files: Mutex<HashMap<String, FileRecord>>,
}

impl StateStore {
    /// Load the store from disk, starting empty if the file does not exist.
    ///
    /// An existing but unparsable state file is an error: the process must
    /// not start with ambiguous delivery state.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let files = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let state: PersistedState = serde_json::from_str(&content)
                    .wrap_err_with(|| format!("Failed to parse state file {}", path.display()))?;
                state.files
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file, starting empty");
                HashMap::new()
            }
            Err(e) => {
                return Err(e)
                    .wrap_err_with(|| format!("Failed to read state file {}", path.display()));
            }
        };

        info!(path = %path.display(), records = files.len(), "State loaded");
        Ok(Self {
            path,
            files: Mutex::new(files),
        })
    }

    /// Create an empty store that will persist to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Write the full map to disk as one pretty-printed JSON document
    pub async fn save(&self) -> Result<()> {
        let snapshot = {
            let files = self.files.lock().await;
            PersistedState {
                files: files.clone(),
            }
        };

        let json = serde_json::to_string_pretty(&snapshot).wrap_err("Failed to serialize state")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .wrap_err("Failed to create state directory")?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .wrap_err_with(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .wrap_err_with(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), records = snapshot.files.len(), "State saved");
        Ok(())
    }

    /// Get a copy of one record
    pub async fn get(&self, path: &str) -> Option<FileRecord> {
        self.files.lock().await.get(path).cloned()
    }

    /// Insert or replace a record
    pub async fn insert(&self, path: impl Into<String>, record: FileRecord) {
        self.files.lock().await.insert(path.into(), record);
    }

    /// Update a record's status; `error` is recorded when given and cleared
    /// otherwise. Returns false if the path has no record.
    pub async fn update_status(&self, path: &str, status: FileStatus, error: Option<&str>) -> bool {
        let mut files = self.files.lock().await;
        match files.get_mut(path) {
            Some(record) => {
                record.set_status(status, error);
                true
            }
            None => false,
        }
    }

    /// Record one failed delivery attempt against a record
    pub async fn record_attempt_failure(&self, path: &str, message: &str) -> bool {
        let mut files = self.files.lock().await;
        match files.get_mut(path) {
            Some(record) => {
                record.record_failure(message);
                true
            }
            None => false,
        }
    }

    /// Re-queue a record for dispatch, clearing its error but keeping hash
    /// and retry count
    pub async fn requeue(&self, path: &str) -> bool {
        let mut files = self.files.lock().await;
        match files.get_mut(path) {
            Some(record) => {
                record.requeue();
                true
            }
            None => false,
        }
    }

    /// Paths of all records currently in the given status
    pub async fn paths_with_status(&self, status: FileStatus) -> Vec<String> {
        self.files
            .lock()
            .await
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Copy of the full map
    pub async fn snapshot(&self) -> HashMap<String, FileRecord> {
        self.files.lock().await.clone()
    }

    /// Number of records
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    /// Check if the store has no records
    pub async fn is_empty(&self) -> bool {
        self.files.lock().await.is_empty()
    }

    /// The file this store persists to
    pub fn path(&self) -> &Path {
        &self.path
    }
}
