//! Flowatom Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns raw network capture files into flat string tuples for a downstream
//! stream processor, then removes the consumed file.
//!
//! # Supported Formats
//!
//! - **Flow files**: fixed-layout binary flow records, one tuple per record
//!   on the default stream
//! - **Trip files**: decoded by `tripdump` into labelled text lines, one
//!   tuple per accepted line on the stream named by its label
//!
//! # Example
//!
//! ```no_run
//! use flowatom_ingest::config::IngestConfig;
//! use flowatom_ingest::emit::JsonLinesEmitter;
//! use flowatom_ingest::pipeline::{FlowPipeline, TripPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let mut out = JsonLinesEmitter::stdout();
//!
//!     FlowPipeline::from_config(&config).process(Path::new("/data/proc/flows.rw"), &mut out)?;
//!     TripPipeline::from_config(&config)
//!         .process(Path::new("/data/proc/capture.trip"), &mut out)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod emit;
pub mod flow;
pub mod pipeline;
pub mod poll;
pub mod reclaim;
pub mod trip;
