//! Three-step delivery protocol
//!
//! Initial upload -> event query -> final upload. Any transport error,
//! non-200 status, or undecodable identifier aborts the whole attempt; the
//! protocol is not resumable mid-attempt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::debug;

use crate::config::UploadConfig;

use super::{UploadError, Uploader, ensure_ok, file_part};

/// Expected body of the initial-upload response
#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_id: String,
}

/// Expected body of the event-query response
#[derive(Debug, Deserialize)]
struct EventQueryResponse {
    event_id: String,
}

/// Client for the three-step upload handshake
pub struct ThreeStepUploader {
    http: Client,
    initial_upload_url: String,
    event_query_url: String,
    final_upload_url: String,
    timeout: Duration,
}

impl ThreeStepUploader {
    /// Create a client from configuration
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let timeout = config.http_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UploadError::Network)?;

        Ok(Self {
            http,
            initial_upload_url: config.initial_upload_url.clone(),
            event_query_url: config.event_query_url.clone(),
            final_upload_url: config.final_upload_url.clone(),
            timeout,
        })
    }

    /// Step 1: post the file, expect an upload identifier back
    async fn initial_upload(&self, path: &Path) -> Result<String, UploadError> {
        let form = Form::new().part("file", file_part(path).await?);

        let resp = self
            .http
            .post(&self.initial_upload_url)
            .multipart(form)
            .send()
            .await?;
        ensure_ok("initial upload", &resp)?;

        let body: UploadResponse = resp.json().await.map_err(|e| UploadError::InvalidResponse {
            step: "initial upload",
            message: e.to_string(),
        })?;

        Ok(body.upload_id)
    }

    /// Step 2: resolve the event the upload belongs to
    async fn query_event(&self, upload_id: &str) -> Result<String, UploadError> {
        let resp = self
            .http
            .post(&self.event_query_url)
            .json(&serde_json::json!({ "upload_id": upload_id }))
            .send()
            .await?;
        ensure_ok("event query", &resp)?;

        let body: EventQueryResponse =
            resp.json().await.map_err(|e| UploadError::InvalidResponse {
                step: "event query",
                message: e.to_string(),
            })?;

        Ok(body.event_id)
    }

    /// Step 3: post the file again, bound to the event
    async fn final_upload(&self, path: &Path, event_id: &str) -> Result<(), UploadError> {
        let form = Form::new()
            .text("event_id", event_id.to_string())
            .part("file", file_part(path).await?);

        let resp = self
            .http
            .post(&self.final_upload_url)
            .multipart(form)
            .send()
            .await?;
        ensure_ok("final upload", &resp)?;

        Ok(())
    }

    async fn attempt(&self, path: &Path) -> Result<(), UploadError> {
        let upload_id = self.initial_upload(path).await?;
        debug!(path = %path.display(), %upload_id, "Initial upload accepted");

        let event_id = self.query_event(&upload_id).await?;
        debug!(path = %path.display(), %event_id, "Event resolved");

        self.final_upload(path, &event_id).await?;
        debug!(path = %path.display(), "Final upload accepted");

        Ok(())
    }
}

#[async_trait]
impl Uploader for ThreeStepUploader {
    async fn deliver(&self, path: &Path, _hash: &str) -> Result<(), UploadError> {
        tokio::time::timeout(self.timeout, self.attempt(path))
            .await
            .map_err(|_| UploadError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    #[test]
    fn test_from_config() {
        let config = UploadConfig {
            protocol: Protocol::ThreeStep,
            initial_upload_url: "http://localhost:9000/upload".to_string(),
            event_query_url: "http://localhost:9000/event".to_string(),
            final_upload_url: "http://localhost:9000/final".to_string(),
            http_timeout_secs: 7,
            ..Default::default()
        };

        let uploader = ThreeStepUploader::from_config(&config).unwrap();
        assert_eq!(uploader.timeout, Duration::from_secs(7));
        assert_eq!(uploader.event_query_url, "http://localhost:9000/event");
    }

    #[test]
    fn test_response_schemas() {
        let body: UploadResponse =
            serde_json::from_str(r#"{"upload_id": "u-42", "message": "ok"}"#).unwrap();
        assert_eq!(body.upload_id, "u-42");

        let body: EventQueryResponse = serde_json::from_str(r#"{"event_id": "e-7"}"#).unwrap();
        assert_eq!(body.event_id, "e-7");

        // A missing identifier is a decode failure, not a silent default
        assert!(serde_json::from_str::<UploadResponse>(r#"{"message": "ok"}"#).is_err());
    }
}
