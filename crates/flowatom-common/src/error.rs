//! Error types for flowatom

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for flowatom operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Main error type for flowatom
///
/// Everything except [`FlowError::Reclaim`] aborts processing of the current
/// file. Reclaim failures are reported after all tuples have been emitted.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open capture file `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid capture file `{path}`: {message}")]
    Format { path: PathBuf, message: String },

    #[error("Decoder `{binary}` could not be spawned: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decoder stdout unavailable")]
    StdoutUnavailable,

    #[error("Failed to wait for decoder process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("Record could not be normalized: {0}")]
    Normalize(String),

    #[error("Record cannot be encoded: {0}")]
    Encode(String),

    #[error("Emit error: {0}")]
    Emit(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to remove `{path}`: {source}")]
    Reclaim {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}
