//! The data-access seam between placement logic and a store backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::tables::Table;

/// Row store holding placement requests and results.
///
/// Documents follow the row-store envelope: inserts carry
/// `{values: {request_id, ...}, consistencyInfo: {...}}`, deletes carry
/// only the consistency block.
#[async_trait]
pub trait PlacementStore: Send + Sync {
    /// Insert the row in `document.values`.
    async fn insert(&self, table: Table, document: &Value) -> StoreResult<()>;

    /// Fetch the row keyed by `key`; `None` when absent.
    async fn get(&self, table: Table, key: &str) -> StoreResult<Option<Value>>;

    /// Delete the row keyed by `key`.
    async fn delete(&self, table: Table, key: &str, document: &Value) -> StoreResult<()>;
}
