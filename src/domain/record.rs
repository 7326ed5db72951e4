//! Per-file delivery records
//!
//! `FileRecord` is the persisted lifecycle entry for one watched file.
//! Records move `Pending -> Processing -> {Completed | Failed}`; a Failed
//! record only re-enters Pending when the file's content changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Discovered (or re-discovered after a content change), waiting for dispatch
    #[default]
    Pending,
    /// Owned by an upload worker
    Processing,
    /// Delivered to the remote endpoint
    Completed,
    /// All delivery attempts exhausted
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted state of a single watched file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Hex-encoded SHA-256 of the file content as last reconciled
    pub hash: String,

    /// Timestamp of the last state transition
    pub last_update: DateTime<Utc>,

    /// Current lifecycle status
    pub status: FileStatus,

    /// Failed attempts in the current delivery episode
    pub retry_count: u32,

    /// Last failure message, empty when none
    pub error: String,
}

impl FileRecord {
    /// Create a fresh Pending record for newly discovered or changed content
    pub fn pending(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            last_update: Utc::now(),
            status: FileStatus::Pending,
            retry_count: 0,
            error: String::new(),
        }
    }

    /// Update the status; `error` is recorded when given and cleared otherwise
    pub fn set_status(&mut self, status: FileStatus, error: Option<&str>) {
        self.status = status;
        self.error = error.map(str::to_string).unwrap_or_default();
        self.last_update = Utc::now();
    }

    /// Record one failed delivery attempt
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error = message.into();
        self.retry_count += 1;
        self.last_update = Utc::now();
    }

    /// Put the record back in line for dispatch, keeping hash and retry count.
    ///
    /// Used by startup recovery for records left in Processing by a dead run.
    pub fn requeue(&mut self) {
        self.status = FileStatus::Pending;
        self.error.clear();
        self.last_update = Utc::now();
    }

    /// Check if the record reached a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, FileStatus::Completed | FileStatus::Failed)
    }
}
