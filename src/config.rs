//! Client configuration.
//!
//! Configuration can be built in code or loaded from TOML. The API key is
//! deliberately absent: it is passed explicitly to [`ClearSkyClient::new`].
//!
//! ```toml
//! base_url = "https://api.clearsky.vision"
//! timeout_secs = 3000
//!
//! [download]
//! chunk_size_bytes = 1048576
//! show_progress = true
//! ```
//!
//! [`ClearSkyClient::new`]: crate::api::ClearSkyClient::new

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::LoggingMode;
use crate::error::ClientError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.clearsky.vision";

/// Default request timeout. Composite processing runs server-side before the
/// first byte is sent, so this is generous.
const DEFAULT_TIMEOUT_SECS: u64 = 3000;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_USER_AGENT: &str = concat!("clearsky-client/", env!("CARGO_PKG_VERSION"));

/// Default streaming chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Smallest accepted chunk size (64 KiB).
pub const MIN_CHUNK_SIZE: usize = 64 * 1024;

/// Largest accepted chunk size (4 MiB).
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Responses smaller than this are treated as error text, not artifacts.
pub const DEFAULT_MIN_ARTIFACT_BYTES: u64 = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// ClientConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API endpoint, e.g. `https://api.clearsky.vision`.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// How request URLs are rendered in logs.
    pub logging_mode: LoggingMode,
    /// Streaming download settings.
    pub download: DownloadConfig,
    /// Estimate re-poll settings.
    pub estimate_repoll: EstimateRepollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            logging_mode: LoggingMode::default(),
            download: DownloadConfig::default(),
            estimate_repoll: EstimateRepollConfig::default(),
        }
    }
}

/// Streaming download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Write buffer size; disk writes happen in pieces of this size.
    pub chunk_size_bytes: usize,
    /// Sanity floor below which a response is treated as an error message.
    pub min_artifact_bytes: u64,
    /// Render a byte progress bar on stderr.
    pub show_progress: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            min_artifact_bytes: DEFAULT_MIN_ARTIFACT_BYTES,
            show_progress: false,
        }
    }
}

/// Fixed wait-and-re-poll behaviour for composite estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateRepollConfig {
    /// Total attempts, including the first. `1` disables re-polling.
    pub attempts: u32,
    /// Wait between attempts in seconds.
    pub interval_secs: u64,
}

impl Default for EstimateRepollConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            interval_secs: 5,
        }
    }
}

impl EstimateRepollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ClientConfig {
    /// Creates a default configuration pointing at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` for syntax errors or invalid values.
    pub fn from_toml_str(input: &str) -> Result<Self, ClientError> {
        let config: ClientConfig = toml::from_str(input)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            ClientError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ClientError> {
        self.parsed_base_url()?;

        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ClientError::Config("Timeouts must be greater than 0".into()));
        }

        let chunk = self.download.chunk_size_bytes;
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk) {
            return Err(ClientError::Config(format!(
                "chunk_size_bytes must be between {} and {}, got {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE, chunk
            )));
        }

        if self.estimate_repoll.attempts == 0 {
            return Err(ClientError::Config(
                "estimate_repoll.attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Parses `base_url`.
    ///
    /// The returned path always ends in `/`, so endpoint paths joined onto it
    /// keep any prefix (e.g. a reverse proxy mount point).
    pub fn parsed_base_url(&self) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid base_url: {}", e)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config("base_url cannot be a base URL".into()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ClientError::Config(
                "base_url must not carry a query or fragment".into(),
            ));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
