//! Error types for lanegen.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using lanegen's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for lanegen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration document does not exist.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A configuration document is not valid JSON for its schema.
    #[error("failed to decode JSON in {}: {source}", path.display())]
    ConfigParse {
        /// Path of the offending document.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A step asks for an element kind the compiler does not know.
    #[error("unknown or unsupported element type: {0}")]
    UnsupportedElementKind(String),

    /// Launch-syntax or profile text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Branch graph construction failed.
    #[error("graph error: {0}")]
    Graph(String),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
