//! Per-file processing pipelines
//!
//! Both pipelines read one capture file start to finish, emit every accepted
//! tuple in source order and then reclaim the file. A fatal error returns
//! before the reclaim step, leaving the file where it was.

use std::path::{Path, PathBuf};

use flowatom_common::{FileReport, Result};
use tracing::{info, info_span, Instrument};

use crate::config::IngestConfig;
use crate::emit::{Emitter, DEFAULT_STREAM};
use crate::flow::{normalize, AddressPolicy, FixedLayoutSource, FlowSource};
use crate::reclaim::reclaim_or_warn;
use crate::trip::TripdumpReader;

/// Flow-file (format A) pipeline
pub struct FlowPipeline<S = FixedLayoutSource> {
    source: S,
    policy: AddressPolicy,
}

impl FlowPipeline<FixedLayoutSource> {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(FixedLayoutSource::new(), config.address_policy)
    }
}

impl<S: FlowSource> FlowPipeline<S> {
    pub fn new(source: S, policy: AddressPolicy) -> Self {
        Self { source, policy }
    }

    /// Process one flow file, emitting on the default stream
    pub fn process(&self, path: &Path, emitter: &mut dyn Emitter) -> Result<FileReport> {
        let span = info_span!("flow_file", path = %path.display());
        let _enter = span.enter();

        let mut report = FileReport::new(path);
        for record in self.source.open(path)? {
            let record = record?;
            report.records += 1;

            let tuple = normalize(&record, self.policy)?;
            emitter.emit(DEFAULT_STREAM, &tuple)?;
            report.emitted += 1;
        }

        report.reclaimed = reclaim_or_warn(path);
        info!(records = report.records, emitted = report.emitted, "Processed flow file");
        Ok(report)
    }
}

/// Trip-file (format B) pipeline
pub struct TripPipeline {
    tripdump: PathBuf,
}

impl TripPipeline {
    pub fn new(tripdump: impl Into<PathBuf>) -> Self {
        Self {
            tripdump: tripdump.into(),
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.tripdump_bin.clone())
    }

    /// Process one trip file, emitting each record on its label's stream
    pub async fn process(&self, path: &Path, emitter: &mut dyn Emitter) -> Result<FileReport> {
        let span = info_span!("trip_file", path = %path.display());
        self.run(path, emitter).instrument(span).await
    }

    async fn run(&self, path: &Path, emitter: &mut dyn Emitter) -> Result<FileReport> {
        let mut reader = TripdumpReader::spawn(&self.tripdump, path).await?;
        let mut report = FileReport::new(path);

        if let Err(err) = drain(&mut reader, emitter, &mut report).await {
            reader.abort().await;
            return Err(err);
        }
        report.records = reader.lines_read();
        report.dropped = reader.dropped();
        reader.finish().await?;

        report.reclaimed = reclaim_or_warn(path);
        info!(
            lines = report.records,
            emitted = report.emitted,
            dropped = report.dropped,
            "Processed trip file"
        );
        Ok(report)
    }
}

async fn drain(
    reader: &mut TripdumpReader,
    emitter: &mut dyn Emitter,
    report: &mut FileReport,
) -> Result<()> {
    while let Some(record) = reader.next_record().await? {
        emitter.emit(record.label.stream(), &record.fields)?;
        report.emitted += 1;
    }
    Ok(())
}
