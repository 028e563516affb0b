//! Embedded redb backend for the request and result tables.
//!
//! Rows are stored JSON-serialized under their `request_id`. Used when no
//! replicated store is configured, and as the store behind tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable};
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::PlacementStore;
use crate::tables::{REQUESTS, RESULTS, Table};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Thread-safe row store backed by redb.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Database>,
}

impl LocalStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "local store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory local store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(REQUESTS).map_err(map_err!(Table))?;
        txn.open_table(RESULTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Write `row` under `key`, replacing any previous row.
    pub fn put_row(&self, table: Table, key: &str, row: &Value) -> StoreResult<()> {
        let value = serde_json::to_vec(row).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
            t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%table, %key, "row stored");
        Ok(())
    }

    /// Read the row stored under `key`.
    pub fn row(&self, table: Table, key: &str) -> StoreResult<Option<Value>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let row = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Remove the row under `key`. Returns whether it existed.
    pub fn remove_row(&self, table: Table, key: &str) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table.definition()).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%table, %key, existed, "row deleted");
        Ok(existed)
    }
}

#[async_trait]
impl PlacementStore for LocalStore {
    async fn insert(&self, table: Table, document: &Value) -> StoreResult<()> {
        let row = document.get("values").unwrap_or(document);
        let key = row
            .get("request_id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::MissingKey(row.to_string()))?;
        self.put_row(table, key, row)
    }

    async fn get(&self, table: Table, key: &str) -> StoreResult<Option<Value>> {
        self.row(table, key)
    }

    async fn delete(&self, table: Table, key: &str, _document: &Value) -> StoreResult<()> {
        self.remove_row(table, key)?;
        Ok(())
    }
}
