//! Removal of consumed capture files

use std::path::Path;

use flowatom_common::{FlowError, Result};
use tracing::{debug, warn};

/// Delete `path`
pub fn reclaim(path: &Path) -> Result<()> {
    std::fs::remove_file(path).map_err(|source| FlowError::Reclaim {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Reclaimed capture file");
    Ok(())
}

/// Delete `path`, logging a failure instead of returning it
///
/// Returns whether the file was removed.
pub fn reclaim_or_warn(path: &Path) -> bool {
    match reclaim(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to reclaim capture file");
            false
        },
    }
}
