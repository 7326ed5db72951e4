//! Agent configuration types and loading

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Main agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory layout: watched inbox and terminal destinations
    pub dirs: DirsConfig,

    /// Upload protocol endpoints and HTTP behavior
    pub upload: UploadConfig,

    /// Scan cadence and retry policy
    pub delivery: DeliveryConfig,

    /// State file location
    pub state: StateConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.dirs.watch.as_os_str().is_empty() {
            return Err(eyre::eyre!("Watched directory not configured (dirs.watch)"));
        }

        match self.upload.protocol {
            Protocol::ThreeStep => {
                for (name, url) in [
                    ("initial-upload-url", &self.upload.initial_upload_url),
                    ("event-query-url", &self.upload.event_query_url),
                    ("final-upload-url", &self.upload.final_upload_url),
                ] {
                    if url.is_empty() {
                        return Err(eyre::eyre!(
                            "Three-step protocol selected but upload.{} is not set",
                            name
                        ));
                    }
                }
            }
            Protocol::SingleStep => {
                if self.upload.upload_url.is_empty() {
                    return Err(eyre::eyre!(
                        "Single-step protocol selected but upload.upload-url is not set"
                    ));
                }
            }
        }

        if self.delivery.scan_interval_secs == 0 {
            return Err(eyre::eyre!("delivery.scan-interval-secs must be nonzero"));
        }
        if self.delivery.max_retries == 0 {
            return Err(eyre::eyre!("delivery.max-retries must be nonzero"));
        }

        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .filecourier.yml
        let local_config = PathBuf::from(".filecourier.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/filecourier/filecourier.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("filecourier").join("filecourier.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Watched and terminal directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirsConfig {
    /// Watched inbox directory (flat; subdirectories are ignored)
    pub watch: PathBuf,

    /// Where delivered files are moved
    pub completed: PathBuf,

    /// Where permanently failed files are moved
    pub error: PathBuf,
}

impl Default for DirsConfig {
    fn default() -> Self {
        Self {
            watch: PathBuf::from("inbox"),
            completed: PathBuf::from("completed"),
            error: PathBuf::from("error"),
        }
    }
}

/// Upload protocol variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    /// Initial upload, event query, final upload
    #[default]
    ThreeStep,
    /// One upload carrying the file and its content hash
    SingleStep,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ThreeStep => write!(f, "three-step"),
            Self::SingleStep => write!(f, "single-step"),
        }
    }
}

/// Upload endpoints and HTTP behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Protocol variant to use
    pub protocol: Protocol,

    /// Single-step upload endpoint
    #[serde(rename = "upload-url")]
    pub upload_url: String,

    /// Three-step initial upload endpoint
    #[serde(rename = "initial-upload-url")]
    pub initial_upload_url: String,

    /// Three-step event query endpoint
    #[serde(rename = "event-query-url")]
    pub event_query_url: String,

    /// Three-step final upload endpoint
    #[serde(rename = "final-upload-url")]
    pub final_upload_url: String,

    /// Whole-attempt timeout in seconds (covers every step of one attempt)
    #[serde(rename = "http-timeout-secs")]
    pub http_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::ThreeStep,
            upload_url: String::new(),
            initial_upload_url: String::new(),
            event_query_url: String::new(),
            final_upload_url: String::new(),
            http_timeout_secs: 30,
        }
    }
}

impl UploadConfig {
    /// Whole-attempt timeout as a Duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Scan cadence and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Seconds between scan/dispatch cycles
    #[serde(rename = "scan-interval-secs")]
    pub scan_interval_secs: u64,

    /// Delivery attempts per episode before a file is marked failed
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Seconds to wait between attempts
    #[serde(rename = "retry-delay-secs")]
    pub retry_delay_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            max_retries: 3,
            retry_delay_secs: 5,
        }
    }
}

impl DeliveryConfig {
    /// Scan interval as a Duration
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Inter-retry delay as a Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// State file location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path of the JSON state file
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        let path = dirs::data_dir()
            .map(|d| d.join("filecourier").join("state.json"))
            .unwrap_or_else(|| PathBuf::from("state.json"));
        Self { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_three_step() -> Config {
        let mut config = Config::default();
        config.upload.initial_upload_url = "http://localhost:9000/upload".to_string();
        config.upload.event_query_url = "http://localhost:9000/event".to_string();
        config.upload.final_upload_url = "http://localhost:9000/final".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.upload.protocol, Protocol::ThreeStep);
        assert_eq!(config.delivery.scan_interval_secs, 30);
        assert_eq!(config.delivery.max_retries, 3);
        assert_eq!(config.upload.http_timeout_secs, 30);
        assert_eq!(config.dirs.watch, PathBuf::from("inbox"));
    }

    #[test]
    fn test_validate_three_step_requires_all_endpoints() {
        let mut config = valid_three_step();
        assert!(config.validate().is_ok());

        config.upload.event_query_url.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("event-query-url"));
    }

    #[test]
    fn test_validate_single_step_requires_upload_url() {
        let mut config = Config::default();
        config.upload.protocol = Protocol::SingleStep;
        assert!(config.validate().is_err());

        config.upload.upload_url = "http://localhost:9000/upload".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_retries() {
        let mut config = valid_three_step();
        config.delivery.scan_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid_three_step();
        config.delivery.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
dirs:
  watch: /var/spool/courier/inbox
  completed: /var/spool/courier/completed
  error: /var/spool/courier/error

upload:
  protocol: single-step
  upload-url: https://results.example.com/api/upload
  http-timeout-secs: 60

delivery:
  scan-interval-secs: 10
  max-retries: 5
  retry-delay-secs: 2

state:
  path: /var/lib/courier/state.json
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.dirs.watch, PathBuf::from("/var/spool/courier/inbox"));
        assert_eq!(config.upload.protocol, Protocol::SingleStep);
        assert_eq!(config.upload.upload_url, "https://results.example.com/api/upload");
        assert_eq!(config.upload.http_timeout_secs, 60);
        assert_eq!(config.delivery.max_retries, 5);
        assert_eq!(config.state.path, PathBuf::from("/var/lib/courier/state.json"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
delivery:
  scan-interval-secs: 120
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.delivery.scan_interval_secs, 120);

        // Defaults for unspecified
        assert_eq!(config.delivery.max_retries, 3);
        assert_eq!(config.upload.protocol, Protocol::ThreeStep);
        assert_eq!(config.dirs.completed, PathBuf::from("completed"));
    }

    #[test]
    fn test_protocol_kebab_case() {
        let p: Protocol = serde_yaml::from_str("three-step").unwrap();
        assert_eq!(p, Protocol::ThreeStep);
        assert_eq!(Protocol::SingleStep.to_string(), "single-step");
    }
}
