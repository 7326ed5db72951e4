//! filecourier - durable file delivery agent
//!
//! Watches a directory, detects new or changed files by content hash, and
//! drives each one through a retried HTTP upload protocol. Delivery state is
//! persisted across restarts as a single JSON document, and files left
//! mid-flight by an unclean shutdown are re-queued at startup.
//!
//! # Modules
//!
//! - [`config`] - Configuration types and loading
//! - [`domain`] - FileRecord and the status state machine
//! - [`state`] - Durable state store and startup recovery
//! - [`digest`] - Streaming content hashing
//! - [`scanner`] - Watched-directory reconciliation
//! - [`upload`] - Upload protocol clients (three-step and single-step)
//! - [`dispatch`] - Tick loop, worker fan-out, and the per-file worker
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod digest;
pub mod dispatch;
pub mod domain;
pub mod fsutil;
pub mod scanner;
pub mod state;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, DeliveryConfig, DirsConfig, Protocol, StateConfig, UploadConfig};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use domain::{FileRecord, FileStatus};
pub use state::{StateStore, recover};
pub use upload::{SingleStepUploader, ThreeStepUploader, UploadError, Uploader, create_uploader};
