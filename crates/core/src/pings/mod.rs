//! Durable, quota-bounded ping storage.

mod quota;
mod store;

use beacon_domain::PingRecord;

pub use quota::{apply_quota, QuotaOutcome};
pub use store::PingStore;

/// Notified synchronously whenever a ping is recorded or replayed at startup.
///
/// Implementations must not block: the call happens on the scheduler lane.
pub trait PingObserver: Send + Sync {
    fn update(&self, identifier: &str, ping: &PingRecord);
}
