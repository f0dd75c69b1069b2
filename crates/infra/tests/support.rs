//! Shared fixtures for infra integration tests.

#![allow(dead_code)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use beacon_domain::constants::PINGS_STORE_NAME;
use beacon_domain::{Config, JsonObject};
use beacon_infra::database::{DbManager, SqliteStore};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Temporary database directory that outlives every manager opened on it.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir should be created");
        let manager =
            DbManager::open(dir.path().join("beacon.db"), 2).expect("db manager should be created");
        Self { manager: Arc::new(manager), dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("beacon.db")
    }

    /// Fresh pool on the same file, as a restarted process would open it.
    pub fn reopen(&self) -> Arc<DbManager> {
        Arc::new(DbManager::open(self.path(), 2).expect("db manager should reopen"))
    }

    pub fn pings_store(&self) -> Arc<SqliteStore> {
        Arc::new(SqliteStore::new(Arc::clone(&self.manager), PINGS_STORE_NAME))
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self.manager.get_connection().expect("connection should be available");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Client config pointing at `endpoint` and persisting to `db_path`.
pub fn config(endpoint: &str, db_path: Option<PathBuf>) -> Config {
    let mut config = Config {
        application_id: "infra-test".to_string(),
        server_endpoint: endpoint.to_string(),
        ..Config::default()
    };
    config.storage.path = db_path;
    config.upload.request_timeout_ms = 2_000;
    config
}

pub fn payload(seq: u64) -> JsonObject {
    let Value::Object(map) = json!({ "seq": seq, "metrics": { "counter": { "clicks": seq * 2 } } })
    else {
        unreachable!()
    };
    map
}

/// Decode a request body that may or may not be gzipped.
pub fn decode_body(body: &[u8]) -> Value {
    let mut decoder = GzDecoder::new(body);
    let mut plain = Vec::new();
    let bytes = if decoder.read_to_end(&mut plain).is_ok() { plain.as_slice() } else { body };
    serde_json::from_slice(bytes).expect("request body should be JSON")
}
