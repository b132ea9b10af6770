//! Common types used across flowatom

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stream that receives tuples without a record-kind partition
pub const DEFAULT_STREAM: &str = "default";

/// One normalized, positional output tuple
pub type Tuple = Vec<String>;

/// Outcome of processing a single capture file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// Path of the consumed capture file
    pub path: PathBuf,

    /// Records read from the decoder (accepted and dropped)
    pub records: usize,

    /// Tuples handed to the emitter
    pub emitted: usize,

    /// Records filtered out before emission
    pub dropped: usize,

    /// Whether the capture file was removed afterwards
    pub reclaimed: bool,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: 0,
            emitted: 0,
            dropped: 0,
            reclaimed: false,
        }
    }
}

impl std::fmt::Display for FileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} records, {} emitted, {} dropped{}",
            self.path.display(),
            self.records,
            self.emitted,
            self.dropped,
            if self.reclaimed { "" } else { " (not reclaimed)" }
        )
    }
}
