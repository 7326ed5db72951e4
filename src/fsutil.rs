//! Filesystem helpers for terminal file moves

use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use tracing::debug;

/// Move a file into a directory, overwriting any same-named entry.
///
/// The destination directory is created if absent. When rename fails (e.g.
/// the destination is on another filesystem) the move falls back to
/// copy + remove.
pub async fn move_into(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .wrap_err_with(|| format!("Failed to create {}", dest_dir.display()))?;

    let file_name = source
        .file_name()
        .ok_or_else(|| eyre!("Source path has no file name: {}", source.display()))?;
    let dest = dest_dir.join(file_name);

    match tokio::fs::rename(source, &dest).await {
        Ok(()) => {
            debug!(source = %source.display(), dest = %dest.display(), "Moved file");
            Ok(dest)
        }
        Err(_) => {
            tokio::fs::copy(source, &dest)
                .await
                .wrap_err_with(|| {
                    format!("Failed to copy {} to {}", source.display(), dest.display())
                })?;
            tokio::fs::remove_file(source)
                .await
                .wrap_err_with(|| format!("Failed to remove {}", source.display()))?;
            debug!(source = %source.display(), dest = %dest.display(), "Moved file (copy + remove)");
            Ok(dest)
        }
    }
}
