//! Configuration types for transfer-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// How a request is turned into a transfer key
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Canonical request URL only
    ///
    /// Two enqueues of the same URL share one transfer even when their
    /// destinations differ; the second caller is coalesced onto the first.
    #[default]
    Url,
    /// Canonical request URL plus the destination relative path
    UrlAndDestination,
}

/// Storage root configuration
///
/// Each logical directory resolves to its override when set, otherwise to the
/// platform location (documents, data, cache) joined with `app_namespace`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Override for the documents root
    #[serde(default)]
    pub documents_dir: Option<PathBuf>,

    /// Override for the library root
    #[serde(default)]
    pub library_dir: Option<PathBuf>,

    /// Override for the caches root
    #[serde(default)]
    pub caches_dir: Option<PathBuf>,

    /// Folder appended to platform locations (default: "transfer-dl")
    #[serde(default = "default_app_namespace")]
    pub app_namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_dir: None,
            library_dir: None,
            caches_dir: None,
            app_namespace: default_app_namespace(),
        }
    }
}

impl StorageConfig {
    /// Point all three roots below one base directory
    ///
    /// Convenient for tests and sandboxed hosts.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            documents_dir: Some(base.join("documents")),
            library_dir: Some(base.join("library")),
            caches_dir: Some(base.join("caches")),
            app_namespace: default_app_namespace(),
        }
    }
}

/// Transfer session configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Identifier of the background session, used in logs
    #[serde(default = "default_session_identifier")]
    pub identifier: String,

    /// Directory for partial and completed temporary files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// How long a transfer waits for connectivity before failing (default: 60s)
    #[serde(default = "default_connectivity_timeout", with = "duration_serde")]
    pub connectivity_timeout: Duration,

    /// Interval between connectivity polls while waiting (default: 2000ms)
    #[serde(
        default = "default_connectivity_poll_interval",
        with = "duration_millis_serde"
    )]
    pub connectivity_poll_interval: Duration,

    /// Overall request timeout (None = no limit)
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// User-Agent header sent when the request does not set one
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identifier: default_session_identifier(),
            temp_dir: default_temp_dir(),
            connectivity_timeout: default_connectivity_timeout(),
            connectivity_poll_interval: default_connectivity_poll_interval(),
            request_timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Coordinator behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Transfer key derivation (default: URL only)
    #[serde(default)]
    pub key_strategy: KeyStrategy,

    /// Buffer size of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Name of the callback delivery thread
    #[serde(default = "default_delivery_thread_name")]
    pub delivery_thread_name: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            key_strategy: KeyStrategy::default(),
            event_channel_capacity: default_event_channel_capacity(),
            delivery_thread_name: default_delivery_thread_name(),
        }
    }
}

/// Main configuration for DownloadCoordinator
///
/// Fields are organized into sub-configs:
/// - [`storage`](StorageConfig): storage roots
/// - [`session`](SessionConfig): temporary files, connectivity, HTTP settings
/// - [`coordinator`](CoordinatorConfig): key strategy, events, delivery
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage roots
    #[serde(default)]
    pub storage: StorageConfig,

    /// Transfer session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Coordinator settings
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that cannot be expressed by types alone
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event channel capacity must be greater than zero".to_string(),
                key: Some("coordinator.event_channel_capacity".to_string()),
            });
        }
        if self.session.connectivity_poll_interval.is_zero() {
            return Err(Error::Config {
                message: "connectivity poll interval must be greater than zero".to_string(),
                key: Some("session.connectivity_poll_interval".to_string()),
            });
        }
        if self.session.identifier.trim().is_empty() {
            return Err(Error::Config {
                message: "session identifier must not be empty".to_string(),
                key: Some("session.identifier".to_string()),
            });
        }
        if self.storage.app_namespace.contains(['/', '\\']) {
            return Err(Error::Config {
                message: "app namespace must be a single path component".to_string(),
                key: Some("storage.app_namespace".to_string()),
            });
        }
        Ok(())
    }
}

fn default_app_namespace() -> String {
    "transfer-dl".to_string()
}

fn default_session_identifier() -> String {
    "transfer-dl.background-session".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("transfer-dl")
}

fn default_connectivity_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connectivity_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_user_agent() -> String {
    concat!("transfer-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_delivery_thread_name() -> String {
    "transfer-dl-delivery".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond Duration serialization helper
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
