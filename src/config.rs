//! Configuration types for attachment-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

/// Rule mapping a message's metadata to a destination subdirectory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizeStrategy {
    /// `base/<sender>/<file>` (default)
    #[default]
    Sender,
    /// `base/<date>/<file>`
    Date,
    /// `base/<extension>/<file>`
    Type,
    /// `base/<file>`
    Flat,
}

impl OrganizeStrategy {
    /// Configuration spelling of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizeStrategy::Sender => "sender",
            OrganizeStrategy::Date => "date",
            OrganizeStrategy::Type => "type",
            OrganizeStrategy::Flat => "flat",
        }
    }
}

impl FromStr for OrganizeStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sender" => Ok(OrganizeStrategy::Sender),
            "date" => Ok(OrganizeStrategy::Date),
            "type" => Ok(OrganizeStrategy::Type),
            "flat" => Ok(OrganizeStrategy::Flat),
            _ => Err(Error::config(
                "organize_by",
                format!("unknown organize strategy '{s}' (expected sender, date, type or flat)"),
            )),
        }
    }
}

impl std::fmt::Display for OrganizeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the initial candidate filename is chosen before collision resolution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStrategy {
    /// Keep the sanitized remote filename (default)
    #[default]
    Original,
    /// Prefix the sanitized filename with a UTC timestamp
    Timestamp,
    /// Replace the name with a random UUID, keeping the extension
    Uuid,
}

impl NamingStrategy {
    /// Configuration spelling of the strategy
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingStrategy::Original => "original",
            NamingStrategy::Timestamp => "timestamp",
            NamingStrategy::Uuid => "uuid",
        }
    }
}

impl FromStr for NamingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(NamingStrategy::Original),
            "timestamp" => Ok(NamingStrategy::Timestamp),
            "uuid" => Ok(NamingStrategy::Uuid),
            _ => Err(Error::config(
                "naming_strategy",
                format!("unknown naming strategy '{s}' (expected original, timestamp or uuid)"),
            )),
        }
    }
}

impl std::fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Download behavior configuration (directories, organization, concurrency)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Base download directory (default: "./downloads")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Subdirectory strategy (default: sender)
    #[serde(default)]
    pub organize_by: OrganizeStrategy,

    /// Initial filename strategy (default: original)
    #[serde(default)]
    pub naming_strategy: NamingStrategy,

    /// Replace files that existed before the batch started (default: false)
    ///
    /// When false, a file with identical content already at the target path
    /// is skipped and different content gets a `_N` suffixed name.
    #[serde(default)]
    pub overwrite_existing: bool,

    /// Maximum attachments fetched and written at once (default: 3)
    ///
    /// This is the only throttle against the upstream fetch capability.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Deadline for a whole batch (None = no deadline)
    ///
    /// When it elapses no further attachments are dispatched; in-flight ones finish.
    #[serde(default, with = "optional_duration_serde")]
    pub batch_timeout: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            organize_by: OrganizeStrategy::default(),
            naming_strategy: NamingStrategy::default(),
            overwrite_existing: false,
            max_concurrent_downloads: default_max_concurrent(),
            batch_timeout: None,
        }
    }
}

/// Retry configuration for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`AttachmentDownloader`](crate::AttachmentDownloader)
///
/// Download settings are flattened so the serialized form is a single flat
/// object (`base_dir`, `organize_by`, ...); retry settings live under `retry`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry policy for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Reject settings that would make a batch misbehave
    ///
    /// Runs before any work starts; nothing is silently defaulted mid-pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.download.base_dir.as_os_str().is_empty() {
            return Err(Error::config("base_dir", "base_dir must not be empty"));
        }
        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "max_concurrent_downloads",
                "max_concurrent_downloads must be at least 1",
            ));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!("backoff_multiplier must be a finite value >= 1.0, got {multiplier}"),
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::config(
                "retry.initial_delay",
                "initial_delay must not exceed max_delay",
            ));
        }
        Ok(())
    }

    /// Parse a JSON configuration document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
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

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.download.base_dir, PathBuf::from("./downloads"));
        assert_eq!(config.download.organize_by, OrganizeStrategy::Sender);
        assert_eq!(config.download.naming_strategy, NamingStrategy::Original);
        assert!(!config.download.overwrite_existing);
        assert_eq!(config.download.max_concurrent_downloads, 3);
        assert_eq!(config.download.batch_timeout, None);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn organize_strategy_parses_every_known_value() {
        let cases = [
            ("sender", OrganizeStrategy::Sender),
            ("date", OrganizeStrategy::Date),
            ("type", OrganizeStrategy::Type),
            ("flat", OrganizeStrategy::Flat),
            ("  FLAT ", OrganizeStrategy::Flat),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<OrganizeStrategy>().unwrap(), expected, "{input:?}");
        }
    }

    #[test]
    fn unknown_organize_strategy_is_a_config_error() {
        let err = "color".parse::<OrganizeStrategy>().unwrap_err();
        match err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("organize_by"));
                assert!(message.contains("color"), "message should echo the bad value");
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_naming_strategy_is_a_config_error() {
        assert_eq!("uuid".parse::<NamingStrategy>().unwrap(), NamingStrategy::Uuid);
        let err = "sequential".parse::<NamingStrategy>().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "naming_strategy"));
    }

    #[test]
    fn strategies_display_their_config_spelling() {
        assert_eq!(OrganizeStrategy::Type.to_string(), "type");
        assert_eq!(NamingStrategy::Timestamp.to_string(), "timestamp");
    }

    #[test]
    fn from_json_reads_flat_layout() {
        let json = r#"{
            "base_dir": "/srv/mail",
            "organize_by": "type",
            "naming_strategy": "timestamp",
            "overwrite_existing": true,
            "max_concurrent_downloads": 5,
            "batch_timeout": 120,
            "retry": {"max_retries": 1, "initial_delay": 2, "max_delay": 4}
        }"#;

        let config = Config::from_json(json).unwrap();

        assert_eq!(config.download.base_dir, PathBuf::from("/srv/mail"));
        assert_eq!(config.download.organize_by, OrganizeStrategy::Type);
        assert_eq!(config.download.naming_strategy, NamingStrategy::Timestamp);
        assert!(config.download.overwrite_existing);
        assert_eq!(config.download.max_concurrent_downloads, 5);
        assert_eq!(config.download.batch_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(2));
        assert!(config.retry.jitter, "omitted jitter must default to true");
    }

    #[test]
    fn from_json_rejects_unknown_strategy_instead_of_defaulting() {
        let err = Config::from_json(r#"{"organize_by": "color"}"#).unwrap_err();
        assert!(matches!(err, Error::Config { .. }), "got {err:?}");
    }

    #[test]
    fn from_json_reports_malformed_documents_as_config_errors() {
        let err = Config::from_json(r#"{"base_dir": "/dl", "#).unwrap_err();
        assert!(matches!(err, Error::Config { key: None, .. }), "got {err:?}");
        assert_eq!(err.code(), "invalid_configuration");
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.download.max_concurrent_downloads = 0;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "max_concurrent_downloads"));
    }

    #[test]
    fn validate_rejects_empty_base_dir() {
        let mut config = Config::default();
        config.download.base_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        config.retry.backoff_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_initial_delay_above_max() {
        let mut config = Config::default();
        config.retry.initial_delay = Duration::from_secs(60);
        config.retry.max_delay = Duration::from_secs(10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_default_survives_json_round_trip() {
        let original = Config::default();

        let json = serde_json::to_string(&original).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.download.base_dir, original.download.base_dir);
        assert_eq!(restored.download.organize_by, original.download.organize_by);
        assert_eq!(
            restored.download.max_concurrent_downloads,
            original.download.max_concurrent_downloads
        );
        assert_eq!(restored.retry.initial_delay, original.retry.initial_delay);
    }

    #[test]
    fn duration_serde_rejects_negative_integer() {
        let json = r#"{"initial_delay": -1, "max_delay": 60}"#;
        let result = serde_json::from_str::<RetryConfig>(json);
        assert!(result.is_err(), "-1 for a Duration field must be rejected");
    }

    #[test]
    fn batch_timeout_null_means_no_deadline() {
        let config = Config::from_json(r#"{"batch_timeout": null}"#).unwrap();
        assert_eq!(config.download.batch_timeout, None);
    }
}
