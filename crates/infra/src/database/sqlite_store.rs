//! SQLite-backed [`Store`]
//!
//! Each top-level key of the store's document is one row in `kv_entries`,
//! holding the JSON text of that entry. Deeper paths are resolved in memory
//! against the decoded row.

use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::storage::nested::{delete_value, get_value, update_value};
use beacon_core::storage::{Store, TransformFn};
use beacon_domain::{BeaconError, JsonObject, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tokio::task;
use tracing::{instrument, warn};

use super::manager::{map_sql_error, DbManager};

/// [`Store`] persisting one named document in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Arc<DbManager>,
    store_name: String,
}

impl SqliteStore {
    /// Wrap a migrated database. Several stores may share one database as
    /// long as their names differ.
    pub fn new(db: Arc<DbManager>, store_name: impl Into<String>) -> Self {
        Self { db, store_name: store_name.into() }
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }
}

#[async_trait]
impl Store for SqliteStore {
    #[instrument(skip(self), fields(store = %self.store_name))]
    async fn get(&self, index: &[&str]) -> Result<Option<Value>> {
        let db = Arc::clone(&self.db);
        let store_name = self.store_name.clone();
        let index = to_owned_index(index);

        task::spawn_blocking(move || -> Result<Option<Value>> {
            let conn = db.get_connection()?;
            read_value(&conn, &store_name, &index)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self, transform), fields(store = %self.store_name))]
    async fn update(&self, index: &[&str], transform: TransformFn) -> Result<()> {
        if index.is_empty() {
            return Err(BeaconError::InvalidInput("cannot update the store root".into()));
        }
        let db = Arc::clone(&self.db);
        let store_name = self.store_name.clone();
        let index = to_owned_index(index);

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;
            let key = index[0].as_str();

            let mut document = JsonObject::new();
            if let Some(current) = load_entry(&tx, &store_name, key)? {
                document.insert(key.to_string(), current);
            }
            update_value(&mut document, &as_refs(&index), transform)?;
            let value = document.remove(key).unwrap_or(Value::Null);
            write_entry(&tx, &store_name, key, &value)?;

            tx.commit().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    #[instrument(skip(self), fields(store = %self.store_name))]
    async fn delete(&self, index: &[&str]) -> Result<()> {
        let db = Arc::clone(&self.db);
        let store_name = self.store_name.clone();
        let index = to_owned_index(index);

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db.get_connection()?;
            match index.as_slice() {
                [] => {
                    conn.execute("DELETE FROM kv_entries WHERE store_name = ?1", params![store_name])
                        .map_err(map_sql_error)?;
                }
                [key] => {
                    conn.execute(
                        "DELETE FROM kv_entries WHERE store_name = ?1 AND entry_key = ?2",
                        params![store_name, key],
                    )
                    .map_err(map_sql_error)?;
                }
                [key, ..] => {
                    let tx = conn
                        .transaction_with_behavior(TransactionBehavior::Immediate)
                        .map_err(map_sql_error)?;
                    let Some(current) = load_entry(&tx, &store_name, key)? else {
                        return Ok(());
                    };
                    let mut document = JsonObject::new();
                    document.insert(key.clone(), current);
                    if delete_value(&mut document, &as_refs(&index)) {
                        let value = document.remove(key.as_str()).unwrap_or(Value::Null);
                        write_entry(&tx, &store_name, key, &value)?;
                    }
                    tx.commit().map_err(map_sql_error)?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn read_value(conn: &Connection, store_name: &str, index: &[String]) -> Result<Option<Value>> {
    let Some(key) = index.first() else {
        let document = load_document(conn, store_name)?;
        return Ok((!document.is_empty()).then_some(Value::Object(document)));
    };

    let Some(entry) = load_entry(conn, store_name, key)? else {
        return Ok(None);
    };
    let mut document = JsonObject::new();
    document.insert(key.clone(), entry);
    Ok(get_value(&document, &as_refs(index)))
}

fn load_document(conn: &Connection, store_name: &str) -> Result<JsonObject> {
    let mut stmt = conn
        .prepare("SELECT entry_key, value_json FROM kv_entries WHERE store_name = ?1 ORDER BY entry_key")
        .map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![store_name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(map_sql_error)?;

    let mut document = JsonObject::new();
    for row in rows {
        let (key, raw) = row.map_err(map_sql_error)?;
        let value = decode_entry(store_name, &key, &raw);
        document.insert(key, value);
    }
    Ok(document)
}

fn load_entry(conn: &Connection, store_name: &str, key: &str) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM kv_entries WHERE store_name = ?1 AND entry_key = ?2",
            params![store_name, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sql_error)?;
    Ok(raw.map(|raw| decode_entry(store_name, key, &raw)))
}

fn write_entry(conn: &Connection, store_name: &str, key: &str, value: &Value) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO kv_entries (store_name, entry_key, value_json, updated_at)
         VALUES (?1, ?2, ?3, CAST(strftime('%s','now') AS INTEGER))
         ON CONFLICT(store_name, entry_key) DO UPDATE SET
            value_json = excluded.value_json,
            updated_at = excluded.updated_at",
        params![store_name, key, raw],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

/// Undecodable rows surface as `null`; the ping store deletes them.
fn decode_entry(store_name: &str, key: &str, raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(store = store_name, key, error = %err, "stored entry is not valid JSON");
        Value::Null
    })
}

fn to_owned_index(index: &[&str]) -> Vec<String> {
    index.iter().map(|segment| (*segment).to_string()).collect()
}

fn as_refs(index: &[String]) -> Vec<&str> {
    index.iter().map(String::as_str).collect()
}

fn map_join_error(err: task::JoinError) -> BeaconError {
    if err.is_cancelled() {
        BeaconError::Internal("sqlite store task cancelled".into())
    } else {
        BeaconError::Internal(format!("sqlite store task panic: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn open_store(dir: &TempDir, name: &str) -> SqliteStore {
        let db = DbManager::open(dir.path().join("store.db"), 2).expect("database opened");
        SqliteStore::new(Arc::new(db), name)
    }

    #[tokio::test]
    async fn empty_store_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pings");

        assert_eq!(store.get(&[]).await.unwrap(), None);
        assert_eq!(store.get(&["missing"]).await.unwrap(), None);
        assert_eq!(store.get(&["missing", "deeper"]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_creates_rows_and_nested_paths() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pings");

        store.update(&["a"], Box::new(|_| json!({ "n": 1 }))).await.unwrap();
        store.update(&["b", "inner", "x"], Box::new(|_| json!(true))).await.unwrap();

        assert_eq!(store.get(&["a", "n"]).await.unwrap(), Some(json!(1)));
        assert_eq!(
            store.get(&[]).await.unwrap(),
            Some(json!({ "a": { "n": 1 }, "b": { "inner": { "x": true } } }))
        );
    }

    #[tokio::test]
    async fn transform_receives_current_value() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "counters");

        for _ in 0..3 {
            store
                .update(
                    &["hits"],
                    Box::new(|current| json!(current.and_then(|v| v.as_i64()).unwrap_or(0) + 1)),
                )
                .await
                .unwrap();
        }
        assert_eq!(store.get(&["hits"]).await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn empty_index_update_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pings");

        let err = store.update(&[], Box::new(|_| json!({}))).await.unwrap_err();
        assert!(matches!(err, BeaconError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deletes_rows_nested_values_and_everything() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pings");
        store.update(&["a"], Box::new(|_| json!({ "keep": 1, "drop": 2 }))).await.unwrap();
        store.update(&["b"], Box::new(|_| json!(2))).await.unwrap();

        store.delete(&["a", "drop"]).await.unwrap();
        assert_eq!(store.get(&["a"]).await.unwrap(), Some(json!({ "keep": 1 })));

        // Deleting through a non-object is a no-op.
        store.delete(&["b", "nothing"]).await.unwrap();
        assert_eq!(store.get(&["b"]).await.unwrap(), Some(json!(2)));

        store.delete(&["b"]).await.unwrap();
        assert_eq!(store.get(&["b"]).await.unwrap(), None);

        store.delete(&[]).await.unwrap();
        assert_eq!(store.get(&[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stores_sharing_a_database_are_isolated() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(DbManager::open(dir.path().join("store.db"), 2).unwrap());
        let pings = SqliteStore::new(Arc::clone(&db), "pings");
        let events = SqliteStore::new(db, "events");

        pings.update(&["a"], Box::new(|_| json!(1))).await.unwrap();
        events.update(&["a"], Box::new(|_| json!(2))).await.unwrap();

        pings.delete(&[]).await.unwrap();
        assert_eq!(pings.get(&["a"]).await.unwrap(), None);
        assert_eq!(events.get(&["a"]).await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn corrupt_rows_surface_as_null() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, "pings");
        store.update(&["good"], Box::new(|_| json!({ "ok": true }))).await.unwrap();

        let conn = store.db.get_connection().unwrap();
        conn.execute(
            "INSERT INTO kv_entries (store_name, entry_key, value_json, updated_at) VALUES ('pings', 'bad', '{not json', 0)",
            params![],
        )
        .unwrap();

        assert_eq!(store.get(&["bad"]).await.unwrap(), Some(Value::Null));
        assert_eq!(
            store.get(&[]).await.unwrap(),
            Some(json!({ "bad": null, "good": { "ok": true } }))
        );
    }
}
