//! `tracing-subscriber` initialisation

use beacon_domain::{BeaconError, LoggingConfig, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding [`LoggingConfig::filter`].
pub const LOG_ENV_VAR: &str = "BEACON_LOG";

/// Install the global fmt subscriber writing to stderr.
///
/// Returns `Ok(false)` when a global subscriber is already installed, so
/// hosts and tests may call this more than once.
///
/// # Errors
/// Returns `BeaconError::Config` if the filter directive does not parse.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = build_filter(config)?;

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(json = config.json, "logging initialised");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directive = std::env::var(LOG_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.filter.clone());

    EnvFilter::try_new(&directive)
        .map_err(|e| BeaconError::Config(format!("Invalid log filter '{directive}': {e}")))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn second_initialisation_is_a_no_op() {
        std::env::remove_var(LOG_ENV_VAR);
        let config = LoggingConfig::default();

        init_logging(&config).expect("valid filter");
        let second = init_logging(&config).expect("valid filter");
        assert!(!second);
    }

    #[test]
    #[serial]
    fn env_override_takes_precedence() {
        std::env::set_var(LOG_ENV_VAR, "beacon_core=trace");
        let filter = build_filter(&LoggingConfig::default()).unwrap();
        assert!(filter.to_string().contains("beacon_core=trace"));
        std::env::remove_var(LOG_ENV_VAR);
    }

    #[test]
    #[serial]
    fn invalid_directive_is_a_config_error() {
        std::env::remove_var(LOG_ENV_VAR);
        let config = LoggingConfig { filter: "beacon=notalevel".to_string(), json: false };
        assert!(matches!(init_logging(&config), Err(BeaconError::Config(_))));
    }
}
