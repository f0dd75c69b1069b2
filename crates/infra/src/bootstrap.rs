//! Client wiring
//!
//! Builds a [`TelemetryClient`] from a [`Config`]: pings go to SQLite when
//! `storage.path` is set (memory otherwise) and are delivered over HTTP.

use std::sync::Arc;

use beacon_core::storage::{MemoryStore, Store};
use beacon_core::TelemetryClient;
use beacon_domain::constants::PINGS_STORE_NAME;
use beacon_domain::{BeaconError, Config, Result};
use tokio::task;
use tracing::{info, instrument};

use crate::database::{DbManager, SqliteStore};
use crate::http::HttpTransport;

/// Build a client backed by the default infrastructure.
///
/// The client is not initialised; call [`TelemetryClient::initialize`] once
/// the host is ready to start uploading.
///
/// # Errors
/// Returns `BeaconError::Config` for an invalid configuration and
/// `BeaconError::Storage` if the database cannot be opened.
#[instrument(skip(config), fields(application_id = %config.application_id))]
pub async fn build_client(config: Config) -> Result<TelemetryClient> {
    config.validate()?;

    let store = open_store(&config).await?;
    let transport = Arc::new(HttpTransport::from_config(&config.upload)?);

    TelemetryClient::new(config, store, transport)
}

async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let Some(path) = config.storage.path.clone() else {
        info!("No storage path configured, pending pings are kept in memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool_size = config.storage.pool_size;
    let db = task::spawn_blocking(move || DbManager::open(path, pool_size))
        .await
        .map_err(|e| BeaconError::Internal(format!("database open task failed: {e}")))??;

    info!(db_path = %db.path().display(), "Pending pings persisted to SQLite");
    Ok(Arc::new(SqliteStore::new(Arc::new(db), PINGS_STORE_NAME)))
}
