//! Placement error types.

use thiserror::Error;

/// Errors that fail a placement request as a whole.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("malformed placement envelope: {0}")]
    Envelope(String),

    #[error("template error: {0}")]
    Template(#[from] valet_template::TemplateError),

    #[error("store error: {0}")]
    Store(#[from] valet_store::StoreError),

    #[error("serialization error: {0}")]
    Serialize(String),
}

pub type PlacementResult<T> = Result<T, PlacementError>;
