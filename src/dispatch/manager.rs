//! Dispatcher - the tick-driven scan/dispatch/join cycle
//!
//! One cycle = reconcile the watched directory, launch a worker for every
//! Pending file not already in flight, wait for the whole batch, persist the
//! store. Cycles never overlap: the next tick only fires after the previous
//! cycle's workers have all finished.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::domain::FileStatus;
use crate::scanner;
use crate::state::StateStore;
use crate::upload::Uploader;

use super::worker::UploadWorker;

/// Resolved settings the dispatcher needs each cycle
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Watched inbox directory
    pub watch_dir: PathBuf,

    /// Destination for delivered files
    pub completed_dir: PathBuf,

    /// Destination for permanently failed files
    pub error_dir: PathBuf,

    /// Time between cycles
    pub scan_interval: Duration,

    /// Delivery attempts per episode
    pub max_retries: u32,

    /// Delay between attempts
    pub retry_delay: Duration,
}

impl DispatchConfig {
    /// Extract the dispatcher's settings from the full agent config
    pub fn from_config(config: &Config) -> Self {
        Self {
            watch_dir: config.dirs.watch.clone(),
            completed_dir: config.dirs.completed.clone(),
            error_dir: config.dirs.error.clone(),
            scan_interval: config.delivery.scan_interval(),
            max_retries: config.delivery.max_retries,
            retry_delay: config.delivery.retry_delay(),
        }
    }
}

/// Orchestrates scan/dispatch/join cycles over the shared state store
pub struct Dispatcher {
    config: DispatchConfig,
    store: Arc<StateStore>,
    uploader: Arc<dyn Uploader>,

    /// Paths currently owned by a worker. Never persisted; guards against
    /// double dispatch within this process only.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(config: DispatchConfig, store: Arc<StateStore>, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            config,
            store,
            uploader,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run the tick loop until the shutdown channel fires.
    ///
    /// A shutdown lets the cycle in progress finish (its workers are joined
    /// inside `run_cycle`), then flushes state a final time.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!(
            interval_secs = self.config.scan_interval.as_secs(),
            watch_dir = %self.config.watch_dir.display(),
            "Dispatcher started"
        );

        let mut interval = tokio::time::interval(self.config.scan_interval);
        // A long cycle delays the next tick instead of bursting to catch up
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!(error = %e, "Processing cycle failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.store.save().await?;
        info!("Dispatcher stopped");
        Ok(())
    }

    /// Execute one reconcile/dispatch/join/persist cycle
    pub async fn run_cycle(&self) -> Result<()> {
        debug!("Scanning for new or modified files");
        let newly_pending = scanner::reconcile(&self.config.watch_dir, &self.store).await?;

        let pending = self.store.paths_with_status(FileStatus::Pending).await;
        if pending.is_empty() {
            debug!("No pending files to process");
            return Ok(());
        }

        info!(
            pending = pending.len(),
            newly_pending, "Dispatching upload workers"
        );

        let mut workers = JoinSet::new();
        for path in pending {
            let Some(record) = self.store.get(&path).await else {
                continue;
            };

            // Registration and the Pending -> Processing flip happen before
            // the worker is spawned, as one step per file: a second view of
            // the same Pending path cannot dispatch it again.
            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.insert(path.clone()) {
                    debug!(path = %path, "Already in flight, skipping");
                    continue;
                }
            }
            self.store
                .update_status(&path, FileStatus::Processing, None)
                .await;

            workers.spawn(
                UploadWorker {
                    path,
                    hash: record.hash,
                    store: self.store.clone(),
                    uploader: self.uploader.clone(),
                    in_flight: self.in_flight.clone(),
                    completed_dir: self.config.completed_dir.clone(),
                    error_dir: self.config.error_dir.clone(),
                    max_retries: self.config.max_retries,
                    retry_delay: self.config.retry_delay,
                }
                .process(),
            );
        }

        // Batch join: the on-disk snapshot below reflects every worker that
        // started in this cycle
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Upload worker panicked");
            }
        }

        self.store.save().await?;
        info!("Processing cycle finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::UploadError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingUploader {
        calls: AtomicUsize,
        succeed: bool,
    }

    impl CountingUploader {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn deliver(&self, _path: &Path, _hash: &str) -> Result<(), UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(())
            } else {
                Err(UploadError::Status {
                    step: "upload",
                    status: 503,
                })
            }
        }
    }

    struct Harness {
        _temp: tempfile::TempDir,
        watch: PathBuf,
        state_path: PathBuf,
        store: Arc<StateStore>,
        config: DispatchConfig,
    }

    async fn harness() -> Harness {
        let temp = tempdir().unwrap();
        let watch = temp.path().join("inbox");
        tokio::fs::create_dir_all(&watch).await.unwrap();

        let state_path = temp.path().join("state.json");
        let store = Arc::new(StateStore::empty(&state_path));

        let config = DispatchConfig {
            watch_dir: watch.clone(),
            completed_dir: temp.path().join("completed"),
            error_dir: temp.path().join("error"),
            scan_interval: Duration::from_secs(1),
            max_retries: 2,
            retry_delay: Duration::ZERO,
        };

        Harness {
            _temp: temp,
            watch,
            state_path,
            store,
            config,
        }
    }

    #[tokio::test]
    async fn test_cycle_delivers_new_file() {
        let h = harness().await;
        tokio::fs::write(h.watch.join("report.csv"), b"42,alice")
            .await
            .unwrap();

        let uploader = CountingUploader::new(true);
        let dispatcher = Dispatcher::new(h.config.clone(), h.store.clone(), uploader.clone());
        dispatcher.run_cycle().await.unwrap();

        let key = h.watch.join("report.csv").to_string_lossy().into_owned();
        let record = h.store.get(&key).await.unwrap();
        assert_eq!(record.status, FileStatus::Completed);
        assert_eq!(record.retry_count, 0);
        assert_eq!(uploader.calls(), 1);

        assert!(h.config.completed_dir.join("report.csv").exists());
        assert!(!h.watch.join("report.csv").exists());

        // Cycle end persisted the store
        assert!(h.state_path.exists());
    }

    #[tokio::test]
    async fn test_cycle_exhausts_retries_and_fails() {
        let h = harness().await;
        tokio::fs::write(h.watch.join("report.csv"), b"42,alice")
            .await
            .unwrap();

        let uploader = CountingUploader::new(false);
        let dispatcher = Dispatcher::new(h.config.clone(), h.store.clone(), uploader.clone());
        dispatcher.run_cycle().await.unwrap();

        let key = h.watch.join("report.csv").to_string_lossy().into_owned();
        let record = h.store.get(&key).await.unwrap();
        assert_eq!(record.status, FileStatus::Failed);
        assert_eq!(record.retry_count, 2);
        assert!(record.error.contains("503"));
        assert_eq!(uploader.calls(), 2);

        assert!(h.config.error_dir.join("report.csv").exists());
    }

    #[tokio::test]
    async fn test_in_flight_path_is_not_dispatched_again() {
        let h = harness().await;
        tokio::fs::write(h.watch.join("report.csv"), b"42,alice")
            .await
            .unwrap();
        let key = h.watch.join("report.csv").to_string_lossy().into_owned();

        let uploader = CountingUploader::new(true);
        let dispatcher = Dispatcher::new(h.config.clone(), h.store.clone(), uploader.clone());

        // Simulate a worker from an overlapping cycle still owning the path
        dispatcher.in_flight.lock().await.insert(key.clone());

        dispatcher.run_cycle().await.unwrap();

        assert_eq!(uploader.calls(), 0);
        assert_eq!(h.store.get(&key).await.unwrap().status, FileStatus::Pending);
        assert!(h.watch.join("report.csv").exists());
    }

    #[tokio::test]
    async fn test_empty_cycle_skips_the_disk_write() {
        let h = harness().await;

        let uploader = CountingUploader::new(true);
        let dispatcher = Dispatcher::new(h.config.clone(), h.store.clone(), uploader.clone());
        dispatcher.run_cycle().await.unwrap();

        assert_eq!(uploader.calls(), 0);
        assert!(!h.state_path.exists());
    }

    #[tokio::test]
    async fn test_completed_file_is_not_reprocessed() {
        let h = harness().await;
        tokio::fs::write(h.watch.join("report.csv"), b"42,alice")
            .await
            .unwrap();

        let uploader = CountingUploader::new(true);
        let dispatcher = Dispatcher::new(h.config.clone(), h.store.clone(), uploader.clone());
        dispatcher.run_cycle().await.unwrap();
        assert_eq!(uploader.calls(), 1);

        // The file moved out of the inbox; further cycles find nothing new
        dispatcher.run_cycle().await.unwrap();
        assert_eq!(uploader.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_file_retried_only_after_content_change() {
        let h = harness().await;
        tokio::fs::write(h.watch.join("report.csv"), b"42,alice")
            .await
            .unwrap();
        let key = h.watch.join("report.csv").to_string_lossy().into_owned();

        let uploader = CountingUploader::new(false);
        let dispatcher = Dispatcher::new(h.config.clone(), h.store.clone(), uploader.clone());
        dispatcher.run_cycle().await.unwrap();
        assert_eq!(uploader.calls(), 2);
        assert_eq!(h.store.get(&key).await.unwrap().status, FileStatus::Failed);

        // Same content reappearing in the inbox: still Failed, no dispatch
        tokio::fs::copy(h.config.error_dir.join("report.csv"), h.watch.join("report.csv"))
            .await
            .unwrap();
        dispatcher.run_cycle().await.unwrap();
        assert_eq!(uploader.calls(), 2);

        // Changed content re-arms the record
        tokio::fs::write(h.watch.join("report.csv"), b"43,bob")
            .await
            .unwrap();
        dispatcher.run_cycle().await.unwrap();
        assert_eq!(uploader.calls(), 4);
        let record = h.store.get(&key).await.unwrap();
        assert_eq!(record.status, FileStatus::Failed);
        assert_eq!(record.retry_count, 2);
    }
}
