use std::sync::{Arc, Weak};

use beacon_domain::{JsonObject, PingHeaders, PingRecord, QueuedPing, Result, StorageConfig};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::quota::apply_quota;
use super::PingObserver;
use crate::storage::Store;

/// Durable table of collected pings, keyed by identifier.
///
/// Every recorded ping is handed to the attached observers; at startup
/// [`scan_pending_pings`](Self::scan_pending_pings) replays the surviving
/// backlog so uploads resume.
pub struct PingStore {
    store: Arc<dyn Store>,
    observers: RwLock<Vec<Weak<dyn PingObserver>>>,
    max_pending_pings_count: usize,
    max_pending_pings_size: usize,
}

impl PingStore {
    pub fn new(store: Arc<dyn Store>, config: &StorageConfig) -> Self {
        Self {
            store,
            observers: RwLock::new(Vec::new()),
            max_pending_pings_count: config.max_pending_pings_count,
            max_pending_pings_size: config.max_pending_pings_size,
        }
    }

    /// Attach an observer. Only a weak reference is kept; dropped observers
    /// are pruned on the next notification.
    pub fn attach_observer<O>(&self, observer: &Arc<O>)
    where
        O: PingObserver + 'static,
    {
        let observer: Arc<dyn PingObserver> = Arc::clone(observer) as Arc<dyn PingObserver>;
        self.observers.write().push(Arc::downgrade(&observer));
    }

    /// Whether at least one attached observer is still alive.
    pub fn has_observers(&self) -> bool {
        self.observers.read().iter().any(|o| o.strong_count() > 0)
    }

    /// Persist a ping under `identifier`, then notify every observer.
    ///
    /// # Errors
    /// Propagates storage failures. Observers are not notified in that case.
    pub async fn record_ping(
        &self,
        path: &str,
        identifier: &str,
        payload: JsonObject,
        headers: Option<PingHeaders>,
    ) -> Result<()> {
        let ping = PingRecord::new(path, payload, headers);
        let value = serde_json::to_value(&ping)?;
        self.store.update(&[identifier], Box::new(move |_| value)).await?;

        debug!(identifier, path, "Recorded ping");
        metrics::counter!("beacon.pings.recorded").increment(1);
        self.notify(identifier, &ping);
        Ok(())
    }

    /// Remove a ping. No-op if absent.
    pub async fn delete_ping(&self, identifier: &str) -> Result<()> {
        self.store.delete(&[identifier]).await
    }

    /// Every valid ping, ascending by collection date.
    ///
    /// Entries that do not deserialize as a ping record are deleted and
    /// skipped.
    pub async fn get_all_pings(&self) -> Result<Vec<QueuedPing>> {
        let Some(document) = self.store.get(&[]).await? else {
            return Ok(Vec::new());
        };
        let Value::Object(entries) = document else {
            warn!("Unexpected data found at the root of the pings database. Clearing.");
            self.clear_all().await?;
            return Ok(Vec::new());
        };

        let mut pings = Vec::with_capacity(entries.len());
        for (identifier, entry) in entries {
            match serde_json::from_value::<PingRecord>(entry) {
                Ok(record) => pings.push(QueuedPing::new(identifier, record)),
                Err(err) => {
                    warn!(
                        identifier = %identifier,
                        error = %err,
                        "Unexpected data found in pings database. Deleting."
                    );
                    metrics::counter!("beacon.pings.corrupt_deleted").increment(1);
                    self.delete_ping(&identifier).await?;
                }
            }
        }

        pings.sort_by(|a, b| {
            a.record
                .collection_date
                .cmp(&b.record.collection_date)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(pings)
    }

    /// Enforce the pending-ping quota, then replay every survivor to the
    /// observers. No-op without a live observer.
    pub async fn scan_pending_pings(&self) -> Result<()> {
        if !self.has_observers() {
            debug!("No ping observer attached, skipping pending pings scan");
            return Ok(());
        }

        for ping in self.pending_pings_within_quota().await? {
            self.notify(&ping.identifier, &ping.record);
        }
        Ok(())
    }

    /// Delete every stored ping.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.delete(&[]).await
    }

    /// Delete every stored ping except deletion requests, which must still
    /// reach the server. Returns how many pings were deleted.
    pub async fn clear_pending_pings(&self) -> Result<usize> {
        let mut deleted = 0;
        for ping in self.get_all_pings().await? {
            if ping.is_deletion_request() {
                continue;
            }
            self.delete_ping(&ping.identifier).await?;
            deleted += 1;
        }
        info!(deleted, "Cleared pending pings");
        Ok(deleted)
    }

    /// Pings surviving the quota, deletion-request pings first. Evicted
    /// pings are deleted from storage.
    async fn pending_pings_within_quota(&self) -> Result<Vec<QueuedPing>> {
        let pings = self.get_all_pings().await?;
        let ordinary = pings.iter().filter(|p| !p.is_deletion_request()).count();
        if ordinary > self.max_pending_pings_count {
            warn!(
                max = self.max_pending_pings_count,
                surplus = ordinary - self.max_pending_pings_count,
                "More pending pings than allowed in the pings database, deleting old pings"
            );
        }

        let outcome =
            apply_quota(pings, self.max_pending_pings_count, self.max_pending_pings_size);

        if !outcome.evicted.is_empty() {
            warn!(
                evicted = outcome.evicted.len(),
                max_size = self.max_pending_pings_size,
                "Pending pings quota reached, outstanding pings deleted"
            );
        }
        for ping in &outcome.evicted {
            self.delete_ping(&ping.identifier).await?;
            metrics::counter!("beacon.pings.quota_deleted").increment(1);
        }

        #[allow(clippy::cast_precision_loss)]
        {
            metrics::gauge!("beacon.pings.pending").set(outcome.kept.len() as f64);
            metrics::gauge!("beacon.pings.pending_size_bytes").set(outcome.kept_size as f64);
        }
        info!(pending = outcome.kept.len(), "Pending pings scanned");

        Ok(outcome.kept)
    }

    fn notify(&self, identifier: &str, ping: &PingRecord) {
        let observers: Vec<_> = self.observers.read().iter().filter_map(Weak::upgrade).collect();
        for observer in &observers {
            observer.update(identifier, ping);
        }

        let mut attached = self.observers.write();
        if attached.len() != observers.len() {
            attached.retain(|o| o.strong_count() > 0);
        }
    }
}

impl std::fmt::Debug for PingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PingStore")
            .field("observers", &self.observers.read().len())
            .field("max_pending_pings_count", &self.max_pending_pings_count)
            .field("max_pending_pings_size", &self.max_pending_pings_size)
            .finish_non_exhaustive()
    }
}
