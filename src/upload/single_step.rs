//! Single-step delivery protocol
//!
//! One multipart post carrying the file and its content hash.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use tracing::debug;

use crate::config::UploadConfig;

use super::{UploadError, Uploader, ensure_ok, file_part};

/// Client for the single-post upload variant
pub struct SingleStepUploader {
    http: Client,
    upload_url: String,
    timeout: Duration,
}

impl SingleStepUploader {
    /// Create a client from configuration
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let timeout = config.http_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UploadError::Network)?;

        Ok(Self {
            http,
            upload_url: config.upload_url.clone(),
            timeout,
        })
    }

    async fn attempt(&self, path: &Path, hash: &str) -> Result<(), UploadError> {
        let form = Form::new()
            .text("hash", hash.to_string())
            .part("file", file_part(path).await?);

        let resp = self.http.post(&self.upload_url).multipart(form).send().await?;
        ensure_ok("upload", &resp)?;

        debug!(path = %path.display(), "Upload accepted");
        Ok(())
    }
}

#[async_trait]
impl Uploader for SingleStepUploader {
    async fn deliver(&self, path: &Path, hash: &str) -> Result<(), UploadError> {
        tokio::time::timeout(self.timeout, self.attempt(path, hash))
            .await
            .map_err(|_| UploadError::Timeout(self.timeout))?
    }
}
