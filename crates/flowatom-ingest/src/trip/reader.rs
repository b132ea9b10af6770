//! Streaming reader over a `tripdump` child process
//!
//! The child is spawned with `kill_on_drop`, so a reader abandoned before
//! [`TripdumpReader::finish`] still tears the process down. Callers that stop
//! early use [`TripdumpReader::abort`] to kill and reap it in place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use flowatom_common::{FlowError, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, trace, warn};

use super::{classify_line, TextRecord};

const SPAWN_ATTEMPTS: u32 = 4;
const ETXTBSY: i32 = 26;

/// Reads tripdump output for one file, one line at a time
pub struct TripdumpReader {
    binary: PathBuf,
    path: PathBuf,
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    buf: Vec<u8>,
    lines: usize,
    dropped: usize,
}

impl TripdumpReader {
    /// Launch `binary` with `path` as its only argument
    pub async fn spawn(binary: &Path, path: &Path) -> Result<Self> {
        let mut command = Command::new(binary);
        command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        let mut child = spawn_with_retry(&mut command, binary).await?;

        let stdout = child.stdout.take().ok_or(FlowError::StdoutUnavailable)?;
        debug!(binary = %binary.display(), path = %path.display(), pid = ?child.id(), "Spawned decoder");

        Ok(Self {
            binary: binary.to_path_buf(),
            path: path.to_path_buf(),
            child,
            stdout: Some(BufReader::new(stdout)),
            buf: Vec::new(),
            lines: 0,
            dropped: 0,
        })
    }

    /// Next raw output line without its terminator, or `None` at end of output
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        self.buf.clear();
        let n = stdout.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            self.stdout = None;
            return Ok(None);
        }

        let mut line = &self.buf[..];
        if let Some(rest) = line.strip_suffix(b"\n") {
            line = rest;
        }
        if let Some(rest) = line.strip_suffix(b"\r") {
            line = rest;
        }
        self.lines += 1;
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }

    /// Next accepted record, skipping lines the classifier drops
    pub async fn next_record(&mut self) -> Result<Option<TextRecord>> {
        while let Some(line) = self.next_line().await? {
            match classify_line(&line) {
                Ok(record) => return Ok(Some(record)),
                Err(reason) => {
                    self.dropped += 1;
                    trace!(line = self.lines, %reason, "Dropped line");
                },
            }
        }
        Ok(None)
    }

    /// Lines read so far
    pub fn lines_read(&self) -> usize {
        self.lines
    }

    /// Lines dropped by the classifier so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Close the output stream and reap the child
    ///
    /// A non-zero exit is logged but not treated as an error.
    pub async fn finish(mut self) -> Result<ExitStatus> {
        self.stdout = None;
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| FlowError::Wait { source })?;

        if status.success() {
            debug!(binary = %self.binary.display(), path = %self.path.display(), %status, "Decoder exited");
        } else {
            warn!(binary = %self.binary.display(), path = %self.path.display(), %status, "Decoder exited unsuccessfully");
        }
        Ok(status)
    }

    /// Kill the child and wait for it to exit
    ///
    /// Used when processing stops before the output is exhausted. Failures
    /// are only logged.
    pub async fn abort(mut self) {
        self.stdout = None;
        match self.child.kill().await {
            Ok(()) => {
                debug!(binary = %self.binary.display(), path = %self.path.display(), "Killed decoder");
            },
            Err(err) => {
                warn!(binary = %self.binary.display(), path = %self.path.display(), error = %err, "Failed to kill decoder");
            },
        }
    }
}

/// Spawn `command`, retrying briefly while the executable is busy
///
/// A freshly written executable can report `ETXTBSY` while another process
/// still holds a write handle to it.
async fn spawn_with_retry(command: &mut Command, binary: &Path) -> Result<Child> {
    let mut backoff = Duration::from_millis(2);
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let busy = source.kind() == ErrorKind::ExecutableFileBusy
                    || source.raw_os_error() == Some(ETXTBSY);
                if busy && attempt < SPAWN_ATTEMPTS {
                    attempt += 1;
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(FlowError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            },
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::trip::Label;

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-tripdump");

        let result = TripdumpReader::spawn(&missing, Path::new("capture.trip")).await;
        assert!(matches!(result, Err(FlowError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_reads_lines_from_child() {
        // `echo` prints its argument, which stands in for one tripdump line.
        let mut reader =
            TripdumpReader::spawn(Path::new("echo"), Path::new("DNS:|a|b"))
                .await
                .unwrap();

        let record = reader.next_record().await.unwrap().unwrap();
        assert_eq!(record.label, Label::Dns);
        assert_eq!(record.fields.len(), 10);
        assert!(reader.next_record().await.unwrap().is_none());
        assert_eq!(reader.lines_read(), 1);
        assert_eq!(reader.dropped(), 0);

        let status = reader.finish().await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_dropped_lines_are_counted() {
        let mut reader =
            TripdumpReader::spawn(Path::new("echo"), Path::new("other:|a|b"))
                .await
                .unwrap();

        assert!(reader.next_record().await.unwrap().is_none());
        assert_eq!(reader.dropped(), 1);
        reader.finish().await.unwrap();
    }
}
