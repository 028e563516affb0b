//! Template resolution error types.

use thiserror::Error;

/// Result type alias for template resolution.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that abort resolution of a whole request.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template has no resources section")]
    MissingResources,

    #[error("template document is not a mapping: {0}")]
    NotAMapping(String),

    #[error("yaml parse error in {source_name}: {message}")]
    Yaml { source_name: String, message: String },

    #[error("invalid count: {0}")]
    InvalidCount(String),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("template nesting deeper than {0} levels")]
    RecursionLimit(usize),
}
