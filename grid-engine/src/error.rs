//! FILENAME: grid-engine/src/error.rs

use thiserror::Error;

/// Errors surfaced by the grid engine.
///
/// Structural problems (bad filter expressions, transaction conflicts) are
/// reported as data, not through this type.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid grid state: {0}")]
    InvalidState(String),
}

pub type GridResult<T> = Result<T, GridError>;
