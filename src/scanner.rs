//! Watched-directory reconciliation
//!
//! Each pass lists the top-level entries of the watched directory and
//! compares on-disk content hashes against the store. New or modified files
//! get a fresh Pending record; unchanged files are left untouched whatever
//! their status. A content change is also the only way a Failed file gets
//! another delivery episode.

use std::path::Path;

use eyre::{Context, Result};
use tracing::{debug, info, warn};

use crate::digest;
use crate::domain::FileRecord;
use crate::state::StateStore;

/// Reconcile the watched directory against the store.
///
/// Subdirectories are ignored; files that vanished from the directory are
/// not pruned. Unreadable files are skipped for this pass and picked up by a
/// later one. Returns the number of records newly marked Pending.
pub async fn reconcile(dir: &Path, store: &StateStore) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .wrap_err_with(|| format!("Failed to read watched directory {}", dir.display()))?;

    let mut newly_pending = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .wrap_err_with(|| format!("Failed to read entry in {}", dir.display()))?
    {
        let path = entry.path();

        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => continue,
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        }

        let hash = match digest::sha256_file(&path).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };

        let key = path.to_string_lossy().into_owned();
        match store.get(&key).await {
            Some(existing) if existing.hash == hash => {
                debug!(path = %path.display(), "Content unchanged");
            }
            Some(_) => {
                info!(path = %path.display(), "File modified, re-queueing");
                store.insert(key, FileRecord::pending(hash)).await;
                newly_pending += 1;
            }
            None => {
                info!(path = %path.display(), "New file detected");
                store.insert(key, FileRecord::pending(hash)).await;
                newly_pending += 1;
            }
        }
    }

    Ok(newly_pending)
}
