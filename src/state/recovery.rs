//! Startup crash recovery
//!
//! A record stuck in Processing means a previous process died between
//! dispatch and the worker's terminal transition: the in-flight set that
//! guards dispatch is never persisted, so nothing else can explain the
//! status surviving a restart. Those records are re-queued before the first
//! scan so the files are retried.

use eyre::Result;
use tracing::{debug, info, warn};

use crate::domain::FileStatus;

use super::StateStore;

/// Re-queue records left in Processing by a previous run.
///
/// Error is cleared, hash and retry count are kept. State is persisted
/// immediately when anything was reset. Returns the number of records
/// recovered.
pub async fn recover(store: &StateStore) -> Result<usize> {
    let stuck = store.paths_with_status(FileStatus::Processing).await;

    for path in &stuck {
        warn!(path = %path, "Re-queueing file left mid-delivery by previous run");
        store.requeue(path).await;
    }

    if stuck.is_empty() {
        debug!("No records needed recovery");
    } else {
        store.save().await?;
        info!(recovered = stuck.len(), "Crash recovery complete");
    }

    Ok(stuck.len())
}
