//! Configuration structures
//!
//! Every section has a `Default` matching the SDK's documented limits, so a
//! config file only needs to name what it overrides. [`Config::validate`] is
//! the one place where the SDK fails synchronously.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_MAX_PENDING_PINGS_COUNT, DEFAULT_MAX_PENDING_PINGS_SIZE, DEFAULT_MAX_PING_BODY_SIZE,
    DEFAULT_MAX_PRE_INIT_QUEUE_SIZE, DEFAULT_MAX_RECOVERABLE_FAILURES, DEFAULT_MAX_WAIT_ATTEMPTS,
    DEFAULT_RATE_LIMIT_INTERVAL_MS, DEFAULT_RATE_LIMIT_MAX_PINGS, DEFAULT_SERVER_ENDPOINT,
    DEFAULT_TEST_TASK_TIMEOUT_MS, DEFAULT_UPLOAD_TIMEOUT_MS,
};
use crate::errors::{BeaconError, Result};

/// Top-level SDK configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application identifier used in submission paths.
    pub application_id: String,
    /// Collector base URL, without a trailing path.
    pub server_endpoint: String,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application_id: "beacon-app".to_string(),
            server_endpoint: DEFAULT_SERVER_ENDPOINT.to_string(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Task scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tasks accepted before `flush_init`; further launches are dropped.
    pub max_pre_init_queue_size: usize,
    /// Deadlock guard for test launches.
    pub test_task_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_pre_init_queue_size: DEFAULT_MAX_PRE_INIT_QUEUE_SIZE,
            test_task_timeout_ms: DEFAULT_TEST_TASK_TIMEOUT_MS,
        }
    }
}

impl SchedulerConfig {
    pub fn test_task_timeout(&self) -> Duration {
        Duration::from_millis(self.test_task_timeout_ms)
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Connection pool size for the SQLite store.
    pub pool_size: u32,
    /// Maximum number of ordinary pending pings kept on disk.
    pub max_pending_pings_count: usize,
    /// Maximum cumulative serialized size of ordinary pending pings.
    pub max_pending_pings_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 4,
            max_pending_pings_count: DEFAULT_MAX_PENDING_PINGS_COUNT,
            max_pending_pings_size: DEFAULT_MAX_PENDING_PINGS_SIZE,
        }
    }
}

/// Ping upload policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Consecutive recoverable failures that end one upload trigger.
    pub max_recoverable_failures: u32,
    /// Consecutive throttled waits that end one upload trigger.
    pub max_wait_attempts: u32,
    /// Largest uncompressed body that will be sent.
    pub max_ping_body_size: usize,
    pub rate_limit_interval_ms: u64,
    pub rate_limit_max_pings: u32,
    pub request_timeout_ms: u64,
    /// Gzip request bodies.
    pub compress: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_recoverable_failures: DEFAULT_MAX_RECOVERABLE_FAILURES,
            max_wait_attempts: DEFAULT_MAX_WAIT_ATTEMPTS,
            max_ping_body_size: DEFAULT_MAX_PING_BODY_SIZE,
            rate_limit_interval_ms: DEFAULT_RATE_LIMIT_INTERVAL_MS,
            rate_limit_max_pings: DEFAULT_RATE_LIMIT_MAX_PINGS,
            request_timeout_ms: DEFAULT_UPLOAD_TIMEOUT_MS,
            compress: true,
        }
    }
}

impl UploadConfig {
    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Logging settings consumed by the infra logging initialiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info,beacon_core=debug`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `BeaconError::Config` if:
    /// - the application id is empty or contains characters outside
    ///   `[A-Za-z0-9._-]`
    /// - the server endpoint is not an absolute `http`/`https` URL
    /// - any queue, quota or policy limit is zero
    pub fn validate(&self) -> Result<()> {
        validate_application_id(&self.application_id)?;
        validate_endpoint(&self.server_endpoint)?;

        let limits = [
            ("scheduler.max_pre_init_queue_size", self.scheduler.max_pre_init_queue_size as u64),
            ("storage.max_pending_pings_count", self.storage.max_pending_pings_count as u64),
            ("storage.max_pending_pings_size", self.storage.max_pending_pings_size as u64),
            ("storage.pool_size", u64::from(self.storage.pool_size)),
            ("upload.max_recoverable_failures", u64::from(self.upload.max_recoverable_failures)),
            ("upload.max_ping_body_size", self.upload.max_ping_body_size as u64),
            ("upload.rate_limit_interval_ms", self.upload.rate_limit_interval_ms),
            ("upload.rate_limit_max_pings", u64::from(self.upload.rate_limit_max_pings)),
            ("upload.request_timeout_ms", self.upload.request_timeout_ms),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(BeaconError::Config(format!("{name} must be greater than zero")));
        }

        Ok(())
    }
}

fn validate_application_id(application_id: &str) -> Result<()> {
    if application_id.is_empty() {
        return Err(BeaconError::Config("application_id must not be empty".into()));
    }
    let valid = application_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(BeaconError::Config(format!(
            "application_id '{application_id}' may only contain [A-Za-z0-9._-]"
        )));
    }
    Ok(())
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let url = Url::parse(endpoint)
        .map_err(|e| BeaconError::Config(format!("Invalid server endpoint '{endpoint}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(BeaconError::Config(format!(
            "Server endpoint must use http or https, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.max_pre_init_queue_size, 100);
        assert_eq!(config.storage.max_pending_pings_count, 250);
        assert_eq!(config.storage.max_pending_pings_size, 10 * 1024 * 1024);
        assert_eq!(config.upload.max_recoverable_failures, 3);
    }

    #[test]
    fn rejects_bad_application_ids() {
        let mut config = Config::default();
        config.application_id = String::new();
        assert!(matches!(config.validate(), Err(BeaconError::Config(_))));

        config.application_id = "my app".to_string();
        assert!(matches!(config.validate(), Err(BeaconError::Config(_))));

        config.application_id = "org.example_app-2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_http_endpoints() {
        let mut config = Config::default();
        config.server_endpoint = "ftp://collector.example".to_string();
        assert!(config.validate().is_err());

        config.server_endpoint = "not a url".to_string();
        assert!(config.validate().is_err());

        config.server_endpoint = "http://localhost:8080".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_limits() {
        let mut config = Config::default();
        config.storage.max_pending_pings_count = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.max_pending_pings_count"));
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "application_id": "demo", "upload": { "compress": false } }"#)
                .unwrap();
        assert_eq!(config.application_id, "demo");
        assert!(!config.upload.compress);
        assert_eq!(config.upload.max_wait_attempts, 3);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }
}
