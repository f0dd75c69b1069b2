//! Ping records as persisted by the ping store
//!
//! Persisted shape (one entry per identifier):
//!
//! ```json
//! { "collectionDate": "<ISO-8601>", "path": "<string>", "payload": { ... }, "headers": { ... } }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DELETION_REQUEST_PING_NAME, PING_SCHEMA_VERSION};
use crate::errors::Result;

/// A JSON object payload.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Extra request headers supplied by the ping producer.
pub type PingHeaders = BTreeMap<String, String>;

/// A collected ping, as stored under its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRecord {
    /// Instant the ping was handed to the store.
    pub collection_date: DateTime<Utc>,
    /// Submission path, appended to the server endpoint on upload.
    pub path: String,
    /// Assembled ping body.
    pub payload: JsonObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<PingHeaders>,
}

impl PingRecord {
    /// Build a record stamped with the current time.
    pub fn new(path: impl Into<String>, payload: JsonObject, headers: Option<PingHeaders>) -> Self {
        Self { collection_date: Utc::now(), path: path.into(), payload, headers }
    }

    /// Ping name segment of a `/submit/<app>/<ping>/<version>/<id>` path.
    pub fn ping_name(&self) -> Option<&str> {
        self.path.split('/').nth(3)
    }

    /// Deletion-request pings are never evicted by storage quotas.
    pub fn is_deletion_request(&self) -> bool {
        self.ping_name() == Some(DELETION_REQUEST_PING_NAME)
    }

    /// Size of the serialized record in bytes.
    pub fn size_in_bytes(&self) -> Result<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }
}

/// A ping waiting in the uploader queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedPing {
    /// Identifier the ping is stored under. Never reused.
    pub identifier: String,
    #[serde(flatten)]
    pub record: PingRecord,
}

impl QueuedPing {
    pub fn new(identifier: impl Into<String>, record: PingRecord) -> Self {
        Self { identifier: identifier.into(), record }
    }

    pub fn is_deletion_request(&self) -> bool {
        self.record.is_deletion_request()
    }
}

/// Build the submission path for a ping document.
pub fn build_submission_path(application_id: &str, ping_name: &str, document_id: &str) -> String {
    format!("/submit/{application_id}/{ping_name}/{PING_SCHEMA_VERSION}/{document_id}")
}
