//! Per-file upload worker
//!
//! Owns one file's delivery lifecycle: the bounded retry loop, the terminal
//! status transition, and the move into the completed or error directory.
//! Everything that goes wrong here stays on this file's record; a worker
//! never takes down the dispatcher or its siblings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::domain::FileStatus;
use crate::fsutil;
use crate::state::StateStore;
use crate::upload::{UploadError, Uploader};

/// One dispatched delivery job
pub(crate) struct UploadWorker {
    pub path: String,
    pub hash: String,
    pub store: Arc<StateStore>,
    pub uploader: Arc<dyn Uploader>,
    pub in_flight: Arc<Mutex<HashSet<String>>>,
    pub completed_dir: PathBuf,
    pub error_dir: PathBuf,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl UploadWorker {
    /// Drive the file through up to `max_retries` delivery attempts.
    ///
    /// The record is already in Processing when this runs; the worker always
    /// leaves it in a terminal status and releases the in-flight slot.
    pub async fn process(self) {
        info!(path = %self.path, "Processing file");

        let mut last_error: Option<UploadError> = None;

        for attempt in 1..=self.max_retries {
            match self
                .uploader
                .deliver(Path::new(&self.path), &self.hash)
                .await
            {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    error!(
                        path = %self.path,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Delivery attempt failed"
                    );
                    self.store
                        .record_attempt_failure(&self.path, &e.to_string())
                        .await;
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        match &last_error {
            None => {
                info!(path = %self.path, "Delivered, moving to completed directory");
                self.store
                    .update_status(&self.path, FileStatus::Completed, None)
                    .await;

                if let Err(e) =
                    fsutil::move_into(Path::new(&self.path), &self.completed_dir).await
                {
                    // The protocol decided the outcome; a failed move does not revert it
                    error!(path = %self.path, error = %e, "Failed to move file to completed directory");
                }
            }
            Some(last) => {
                error!(path = %self.path, error = %last, "All delivery attempts failed, moving to error directory");
                self.store
                    .update_status(&self.path, FileStatus::Failed, Some(&last.to_string()))
                    .await;

                if let Err(e) = fsutil::move_into(Path::new(&self.path), &self.error_dir).await {
                    error!(path = %self.path, error = %e, "Failed to move file to error directory");
                }
            }
        }

        self.in_flight.lock().await.remove(&self.path);
    }
}
