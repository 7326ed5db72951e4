//! Upload protocol clients
//!
//! One `deliver` call is one protocol attempt: it either fully succeeds or
//! fails as a unit, and the whole attempt runs under a single timeout
//! budget. Retrying is the dispatcher's concern.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::Part;

mod error;
mod single_step;
mod three_step;

pub use error::UploadError;
pub use single_step::SingleStepUploader;
pub use three_step::ThreeStepUploader;

use crate::config::{Protocol, UploadConfig};

/// A client that can deliver one file to the remote collaborator
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Run one full protocol attempt for the file at `path`.
    ///
    /// `hash` is the content digest recorded at reconciliation time.
    async fn deliver(&self, path: &Path, hash: &str) -> Result<(), UploadError>;
}

/// Create an uploader for the protocol variant selected in config
pub fn create_uploader(config: &UploadConfig) -> Result<Arc<dyn Uploader>, UploadError> {
    match config.protocol {
        Protocol::ThreeStep => Ok(Arc::new(ThreeStepUploader::from_config(config)?)),
        Protocol::SingleStep => Ok(Arc::new(SingleStepUploader::from_config(config)?)),
    }
}

/// Reject any response other than a plain 200
pub(crate) fn ensure_ok(step: &'static str, resp: &reqwest::Response) -> Result<(), UploadError> {
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        return Err(UploadError::Status {
            step,
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Build the multipart `file` part for an upload
pub(crate) async fn file_part(path: &Path) -> Result<Part, UploadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    Ok(Part::bytes(bytes).file_name(file_name))
}
