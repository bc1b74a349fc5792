//! Configuration loading for Uniclip.
//!
//! Configuration is a TOML file (default: `config.toml` in the data
//! directory). Every section and every field except the credentials has a
//! default, so a minimal file only needs `[connection]`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use clip_core::RetryPolicy;
use clip_types::DeviceId;

use crate::connection::ConnectionConfig;
use crate::watcher::WatcherConfig;

/// How received messages reach the clipboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Received messages are written to the clipboard and local copies are
    /// uploaded immediately.
    #[default]
    Automatic,
    /// Nothing moves until the user sends or fetches explicitly.
    Manual,
}

impl SyncMode {
    /// Lowercase name, as used in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "automatic" => Ok(Self::Automatic),
            "manual" => Ok(Self::Manual),
            _ => Err(ConfigError::InvalidSyncMode(s.to_string())),
        }
    }
}

/// Root configuration for Uniclip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Device identity and sync mode.
    #[serde(default)]
    pub device: DeviceSection,
    /// Pub/sub connection settings.
    #[serde(default)]
    pub connection: ConnectionSection,
    /// Clipboard watcher settings.
    #[serde(default)]
    pub watcher: WatcherSection,
    /// Where received files go.
    #[serde(default)]
    pub storage: StorageSection,
    /// History sizes.
    #[serde(default)]
    pub history: HistorySection,
}

/// Device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSection {
    /// Stable device identifier (generated by `uniclip init`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    /// Sync mode (default: automatic).
    #[serde(default)]
    pub sync_mode: SyncMode,
}

/// Connection configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSection {
    /// Stream to subscribe and publish to.
    #[serde(default)]
    pub stream_url: String,
    /// Private key used to authenticate.
    #[serde(default)]
    pub private_key: String,
    /// Connect budget in milliseconds (default: 5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Delay between attempts in milliseconds (default: 1000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Stored messages replayed on subscribe (default: 10).
    #[serde(default = "default_resend_last")]
    pub resend_last: u32,
}

/// Watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatcherSection {
    /// Poll interval in milliseconds (default: 500).
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Image reads slower than this use sampling (default: 200).
    #[serde(default = "default_slow_read_threshold_ms")]
    pub slow_read_threshold_ms: u64,
    /// Offsets inspected by sampled image comparison (default: 100).
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Suppression after writing a received message (default: 500).
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u64,
    /// Suppression after a file copy (default: 700).
    #[serde(default = "default_file_copy_silence_ms")]
    pub file_copy_silence_ms: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageSection {
    /// Directory for received files (default: `<documents>/uniclip`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

/// History configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistorySection {
    /// Received messages kept (default: 5).
    #[serde(default = "default_history_capacity")]
    pub received_capacity: usize,
    /// Sent messages kept (default: 5).
    #[serde(default = "default_history_capacity")]
    pub sent_capacity: usize,
}

// Default value functions
fn default_timeout_ms() -> u64 {
    5000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_resend_last() -> u32 {
    10
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_slow_read_threshold_ms() -> u64 {
    200
}

fn default_sample_count() -> usize {
    clip_core::DEFAULT_SAMPLE_COUNT
}

fn default_silence_ms() -> u64 {
    500
}

fn default_file_copy_silence_ms() -> u64 {
    700
}

fn default_history_capacity() -> usize {
    clip_core::DEFAULT_HISTORY_CAPACITY
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            private_key: String::new(),
            timeout_ms: default_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            resend_last: default_resend_last(),
        }
    }
}

impl fmt::Debug for ConnectionSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSection")
            .field("stream_url", &self.stream_url)
            .field("private_key", &"[REDACTED]")
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("resend_last", &self.resend_last)
            .finish()
    }
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            slow_read_threshold_ms: default_slow_read_threshold_ms(),
            sample_count: default_sample_count(),
            silence_ms: default_silence_ms(),
            file_copy_silence_ms: default_file_copy_silence_ms(),
        }
    }
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            received_capacity: default_history_capacity(),
            sent_capacity: default_history_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Check that the configuration can start a session.
    ///
    /// Missing credentials are unrecoverable without user action.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.private_key.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "connection.private_key",
            });
        }
        if self.connection.stream_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "connection.stream_url",
            });
        }
        self.device_id()?;

        let durations = [
            ("connection.timeout_ms", self.connection.timeout_ms),
            ("connection.retry_delay_ms", self.connection.retry_delay_ms),
            ("watcher.min_interval_ms", self.watcher.min_interval_ms),
            ("watcher.silence_ms", self.watcher.silence_ms),
            ("watcher.file_copy_silence_ms", self.watcher.file_copy_silence_ms),
        ];
        if let Some((field, _)) = durations.into_iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroDuration { field });
        }
        Ok(())
    }

    /// The configured device id.
    pub fn device_id(&self) -> Result<DeviceId, ConfigError> {
        self.device
            .device_id
            .clone()
            .ok_or(ConfigError::MissingField {
                field: "device.device_id",
            })
    }

    /// Settings for the connection controller.
    pub fn connection_config(&self) -> ConnectionConfig {
        let section = &self.connection;
        let policy = RetryPolicy::default()
            .with_timeout(Duration::from_millis(section.timeout_ms))
            .with_retry_delay(Duration::from_millis(section.retry_delay_ms));
        ConnectionConfig::new(section.private_key.clone(), section.stream_url.clone())
            .with_policy(policy)
            .with_resend_last(section.resend_last)
    }

    /// Settings for the clipboard watcher.
    pub fn watcher_config(&self) -> WatcherConfig {
        let section = &self.watcher;
        WatcherConfig {
            min_interval: Duration::from_millis(section.min_interval_ms),
            slow_read_threshold: Duration::from_millis(section.slow_read_threshold_ms),
            sample_count: section.sample_count,
            silence_window: Duration::from_millis(section.silence_ms),
            file_copy_silence: Duration::from_millis(section.file_copy_silence_ms),
        }
    }

    /// Directory for received files.
    ///
    /// Falls back to `<documents>/uniclip`.
    pub fn download_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = &self.storage.download_dir {
            return Ok(dir.clone());
        }
        directories::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|d| d.join("uniclip")))
            .ok_or(ConfigError::MissingField {
                field: "storage.download_dir",
            })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Failed to serialize configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    /// Failed to write configuration file.
    #[error("failed to write config file {path}: {source}")]
    WriteError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A required value is missing or empty.
    #[error("missing required setting `{field}`")]
    MissingField {
        /// Dotted name of the setting.
        field: &'static str,
    },
    /// A timing setting is zero.
    #[error("setting `{field}` must be greater than zero")]
    ZeroDuration {
        /// Dotted name of the setting.
        field: &'static str,
    },
    /// Unknown sync mode.
    #[error("invalid sync mode {0:?} (expected automatic or manual)")]
    InvalidSyncMode(String),
}
