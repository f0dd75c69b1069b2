//! Client facade wiring the scheduler, the ping store and the uploader.

use std::sync::Arc;

use beacon_domain::{build_submission_path, Config, JsonObject, PingHeaders, Result};
use tracing::{info, warn};
use uuid::Uuid;

use crate::pings::PingStore;
use crate::scheduler::Scheduler;
use crate::storage::Store;
use crate::upload::{PingUploader, Transport};

/// An explicitly constructed telemetry client.
///
/// Owns one [`Scheduler`], one [`PingStore`] and one [`PingUploader`].
/// Every public operation is packaged as a scheduler task, so they are
/// observed in call order.
pub struct TelemetryClient {
    config: Config,
    scheduler: Scheduler,
    pings: Arc<PingStore>,
    uploader: Arc<PingUploader>,
}

impl TelemetryClient {
    /// Validate `config` and wire the components together.
    ///
    /// # Errors
    /// Returns `BeaconError::Config` if the configuration is invalid.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(config: Config, store: Arc<dyn Store>, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let scheduler = Scheduler::new(config.scheduler.clone());
        let pings = Arc::new(PingStore::new(store, &config.storage));
        let uploader = PingUploader::new(
            Arc::clone(&pings),
            transport,
            config.server_endpoint.clone(),
            config.upload.clone(),
        );

        Ok(Self { config, scheduler, pings, uploader })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ping_store(&self) -> &Arc<PingStore> {
        &self.pings
    }

    pub fn uploader(&self) -> &Arc<PingUploader> {
        &self.uploader
    }

    /// Start processing. Pending pings from a previous session are scanned
    /// before any task buffered so far.
    pub fn initialize(&self) -> bool {
        let uploader = Arc::clone(&self.uploader);
        let initialized = self.scheduler.flush_init_with(move || async move {
            uploader.scan_pending_pings().await?;
            Ok(())
        });
        if initialized {
            info!(application_id = %self.config.application_id, "Telemetry client initialized");
        }
        initialized
    }

    /// Record a ping named `name` under a fresh identifier.
    ///
    /// Returns whether the submission task was accepted by the scheduler.
    pub fn submit_ping(
        &self,
        name: &str,
        payload: JsonObject,
        headers: Option<PingHeaders>,
    ) -> bool {
        if name.is_empty() || name.contains('/') {
            warn!(ping = name, "Invalid ping name, ignoring submission");
            return false;
        }

        let pings = Arc::clone(&self.pings);
        let application_id = self.config.application_id.clone();
        let name = name.to_string();
        self.scheduler.launch_tagged(format!("submit:{name}"), move || async move {
            let identifier = Uuid::new_v4().to_string();
            let path = build_submission_path(&application_id, &name, &identifier);
            pings.record_ping(&path, &identifier, payload, headers).await?;
            Ok(())
        })
    }

    /// Drop every pending ping, queued and stored, except deletion
    /// requests, which are still sent.
    pub fn clear_pending_uploads(&self) -> bool {
        let pings = Arc::clone(&self.pings);
        let uploader = Arc::clone(&self.uploader);
        self.scheduler.launch_tagged("clear_pending_uploads", move || async move {
            uploader.clear_pending_pings_queue().await;
            pings.clear_pending_pings().await?;
            Ok(())
        })
    }

    /// Drain the scheduler, then wait for the ongoing upload job.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.uploader.block_on_ongoing_uploads().await;
        info!("Telemetry client shut down");
    }
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("application_id", &self.config.application_id)
            .field("scheduler", &self.scheduler.state())
            .field("uploader", &self.uploader)
            .finish_non_exhaustive()
    }
}
