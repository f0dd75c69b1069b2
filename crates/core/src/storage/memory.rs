//! In-memory store

use async_trait::async_trait;
use beacon_domain::{JsonObject, Result};
use parking_lot::Mutex;
use serde_json::Value;

use super::nested::{delete_value, get_value, update_value};
use super::{Store, TransformFn};

/// [`Store`] keeping the document in process memory.
///
/// Used for ephemeral sessions and in tests. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<JsonObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing document.
    pub fn with_document(document: JsonObject) -> Self {
        Self { document: Mutex::new(document) }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, index: &[&str]) -> Result<Option<Value>> {
        let document = self.document.lock();
        if index.is_empty() && document.is_empty() {
            return Ok(None);
        }
        Ok(get_value(&document, index))
    }

    async fn update(&self, index: &[&str], transform: TransformFn) -> Result<()> {
        update_value(&mut self.document.lock(), index, transform)
    }

    async fn delete(&self, index: &[&str]) -> Result<()> {
        delete_value(&mut self.document.lock(), index);
        Ok(())
    }
}
