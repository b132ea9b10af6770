//! Directory polling
//!
//! Files dropped into the poll directory are moved into the processing
//! directory and handed on by their absolute processing path. Only regular
//! files are picked up; directories and symlinks stay where they are.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flowatom_common::{FlowError, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Receives each file claimed by [`DirectoryPoller::run`]
pub trait ClaimHandler {
    fn handle(&mut self, path: PathBuf) -> impl Future<Output = ()>;
}

/// Moves arriving files from a poll directory into a processing directory
#[derive(Debug, Clone)]
pub struct DirectoryPoller {
    poll_dir: PathBuf,
    proc_dir: PathBuf,
}

impl DirectoryPoller {
    pub fn new(poll_dir: impl Into<PathBuf>, proc_dir: impl Into<PathBuf>) -> Self {
        Self {
            poll_dir: poll_dir.into(),
            proc_dir: proc_dir.into(),
        }
    }

    /// Poll from `root/poll`, process in `root/proc`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(root.join("poll"), root.join("proc"))
    }

    pub fn poll_dir(&self) -> &Path {
        &self.poll_dir
    }

    pub fn proc_dir(&self) -> &Path {
        &self.proc_dir
    }

    /// Move every regular file currently in the poll directory
    ///
    /// Returns the absolute processing paths in file-name order.
    pub fn poll_once(&self) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.proc_dir)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.poll_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name());
            }
        }
        names.sort();

        let mut moved = Vec::with_capacity(names.len());
        for name in names {
            let dest = self.proc_dir.join(&name);
            std::fs::rename(self.poll_dir.join(&name), &dest)?;
            let dest = std::path::absolute(&dest)?;
            debug!(path = %dest.display(), "Claimed file");
            moved.push(dest);
        }
        Ok(moved)
    }

    /// Poll every `every`, handing each claimed file to `handler`
    ///
    /// Runs until the surrounding task is dropped. Poll failures are logged
    /// and retried on the next tick. A zero `every` is rejected up front.
    pub async fn run<H: ClaimHandler>(&self, every: Duration, handler: &mut H) -> Result<()> {
        if every.is_zero() {
            return Err(FlowError::Config("poll interval must be non-zero".to_string()));
        }

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.poll_once() {
                Ok(paths) => {
                    for path in paths {
                        handler.handle(path).await;
                    }
                },
                Err(err) => {
                    warn!(dir = %self.poll_dir.display(), error = %err, "Directory poll failed");
                },
            }
        }
    }
}
