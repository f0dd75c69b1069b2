//! Configuration loader
//!
//! Loads SDK configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `BEACON_SERVER_ENDPOINT` is not set, falls back to a config file
//! 3. Probes a fixed list of paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the loaded [`Config`] is validated before it is
//! returned.
//!
//! ## Environment Variables
//! - `BEACON_SERVER_ENDPOINT`: Collector base URL (required)
//! - `BEACON_APPLICATION_ID`: Application identifier
//! - `BEACON_DB_PATH`: SQLite database file; unset keeps pings in memory
//! - `BEACON_MAX_PENDING_PINGS`: Pending ping count quota
//! - `BEACON_MAX_PENDING_PINGS_SIZE`: Pending ping size quota in bytes
//! - `BEACON_LOG_FILTER`: `EnvFilter` directive
//! - `BEACON_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes, in the working directory and then next to the
//! executable: `beacon.toml`, `beacon.json`, `config.toml`, `config.json`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use beacon_domain::{BeaconError, Config, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["beacon.toml", "beacon.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `BeaconError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `BEACON_SERVER_ENDPOINT` is required; everything else falls back to
/// [`Config::default`].
///
/// # Errors
/// Returns `BeaconError::Config` if the endpoint is missing or a value is
/// malformed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config { server_endpoint: env_var("BEACON_SERVER_ENDPOINT")?, ..Config::default() };

    if let Some(application_id) = env_opt("BEACON_APPLICATION_ID") {
        config.application_id = application_id;
    }
    if let Some(path) = env_opt("BEACON_DB_PATH") {
        config.storage.path = Some(PathBuf::from(path));
    }
    if let Some(count) = env_parse::<usize>("BEACON_MAX_PENDING_PINGS")? {
        config.storage.max_pending_pings_count = count;
    }
    if let Some(size) = env_parse::<usize>("BEACON_MAX_PENDING_PINGS_SIZE")? {
        config.storage.max_pending_pings_size = size;
    }
    if let Some(filter) = env_opt("BEACON_LOG_FILTER") {
        config.logging.filter = filter;
    }
    config.logging.json = env_bool("BEACON_LOG_JSON", config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. The format is
/// detected from the file extension.
///
/// # Errors
/// Returns `BeaconError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(BeaconError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            BeaconError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| BeaconError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| BeaconError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| BeaconError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(BeaconError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        BeaconError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Non-empty value of `key`, if set.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| BeaconError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
