//! Error types for the placement stores.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Every replica endpoint failed.
    #[error("store unavailable: {operation} failed on {attempts} endpoint(s), last error: {last}")]
    Unavailable {
        operation: String,
        attempts: usize,
        last: String,
    },

    #[error("no store endpoints configured")]
    NoEndpoints,

    #[error("row has no request_id: {0}")]
    MissingKey(String),

    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
