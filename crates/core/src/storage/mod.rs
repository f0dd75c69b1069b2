//! Durable key-value store port
//!
//! The ping store persists through a nested JSON document addressed by
//! ordered string segments. Implementations live here ([`MemoryStore`]) and
//! in the infra crate (SQLite).

mod memory;
pub mod nested;

use async_trait::async_trait;
use beacon_domain::Result;
use serde_json::Value;

pub use memory::MemoryStore;

/// Transformation applied to the currently persisted value by
/// [`Store::update`]. Receives `None` when nothing is stored at the index.
pub type TransformFn = Box<dyn FnOnce(Option<Value>) -> Value + Send + 'static>;

/// Nested JSON storage keyed by path segments.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the value at `index`.
    ///
    /// An empty index returns the whole document (`None` when empty).
    async fn get(&self, index: &[&str]) -> Result<Option<Value>>;

    /// Replace the value at `index` with `transform(current)`.
    ///
    /// Missing intermediate objects are created. Fails with
    /// `BeaconError::InvalidInput` for an empty index.
    async fn update(&self, index: &[&str], transform: TransformFn) -> Result<()>;

    /// Remove the value at `index`. An empty index clears everything.
    ///
    /// Deleting a missing entry is a no-op.
    async fn delete(&self, index: &[&str]) -> Result<()>;
}
