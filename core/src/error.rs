//! Error types for the reallystop-core library.
//!
//! Termination failures are not errors in this sense: they travel inside
//! [`OperationOutcome`](crate::domain::OperationOutcome). This type covers the
//! settings layer only.

use thiserror::Error;

/// Result type alias for reallystop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or saving settings.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
