//! Upload error types

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from a single delivery attempt.
///
/// The retry loop treats every variant the same way; the distinction exists
/// for the log stream and the persisted error message.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{step} returned status {status}")]
    Status { step: &'static str, status: u16 },

    #[error("Invalid response from {step}: {message}")]
    InvalidResponse { step: &'static str, message: String },

    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_names_the_step() {
        let err = UploadError::Status {
            step: "event query",
            status: 500,
        };
        let message = err.to_string();
        assert!(message.contains("event query"));
        assert!(message.contains("500"));
    }

    #[test]
    fn test_timeout_message() {
        let err = UploadError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("timed out"));
    }
}
