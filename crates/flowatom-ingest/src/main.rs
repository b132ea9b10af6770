//! Flowatom Ingest - capture file normalization tool

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use flowatom_common::logging::{init_logging, LogConfig, LogLevel};
use flowatom_ingest::config::IngestConfig;
use flowatom_ingest::emit::{Emitter, JsonLinesEmitter};
use flowatom_ingest::flow::AddressPolicy;
use flowatom_ingest::pipeline::{FlowPipeline, TripPipeline};
use flowatom_ingest::poll::{ClaimHandler, DirectoryPoller};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "flowatom-ingest")]
#[command(author, version, about = "Normalize network capture files into stream tuples")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Decoder executable for trip files
    #[arg(long, global = true, env = "FLOWATOM_TRIPDUMP_BIN")]
    tripdump: Option<PathBuf>,

    /// Address rendering for flow tuples (native or ipv6)
    #[arg(long, global = true)]
    address_policy: Option<AddressPolicy>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Process flow files
    Flow {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Process trip files through tripdump
    Trip {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Poll a directory and process files as they arrive
    Watch {
        #[arg(short, long, value_enum)]
        format: Format,

        /// Directory new files are dropped into
        #[arg(long)]
        poll_dir: PathBuf,

        /// Directory files are moved to while processed
        #[arg(long)]
        proc_dir: PathBuf,

        /// Seconds between polls
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Flow,
    Trip,
}

struct Processors {
    flow: FlowPipeline,
    trip: TripPipeline,
}

impl Processors {
    /// Process one file, logging a fatal error instead of returning it
    async fn process(&self, format: Format, path: &Path, out: &mut dyn Emitter) -> bool {
        let result = match format {
            Format::Flow => self.flow.process(path, out),
            Format::Trip => self.trip.process(path, out).await,
        };
        match result {
            Ok(_) => true,
            Err(err) => {
                error!(path = %path.display(), error = %err, "Failed to process file; left in place");
                false
            },
        }
    }
}

/// Processes every file the poller claims
struct Watcher<'a> {
    processors: &'a Processors,
    format: Format,
    out: &'a mut dyn Emitter,
}

impl ClaimHandler for Watcher<'_> {
    async fn handle(&mut self, path: PathBuf) {
        self.processors.process(self.format, &path, &mut *self.out).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("flowatom-ingest")
        .build()
        .merge_env()?;
    init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()?;
    if let Some(tripdump) = cli.tripdump {
        config.tripdump_bin = tripdump;
    }
    if let Some(policy) = cli.address_policy {
        config.address_policy = policy;
    }

    let processors = Processors {
        flow: FlowPipeline::from_config(&config),
        trip: TripPipeline::from_config(&config),
    };
    let mut out = JsonLinesEmitter::stdout();

    let (format, paths) = match cli.command {
        Command::Flow { paths } => (Format::Flow, paths),
        Command::Trip { paths } => (Format::Trip, paths),
        Command::Watch {
            format,
            poll_dir,
            proc_dir,
            interval,
        } => {
            let every = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or(config.poll_interval);
            let poller = DirectoryPoller::new(poll_dir, proc_dir);
            info!(
                poll_dir = %poller.poll_dir().display(),
                proc_dir = %poller.proc_dir().display(),
                ?format,
                "Watching for capture files"
            );

            let mut watcher = Watcher {
                processors: &processors,
                format,
                out: &mut out,
            };
            tokio::select! {
                result = poller.run(every, &mut watcher) => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
            return Ok(());
        },
    };

    let mut failed = 0usize;
    for path in &paths {
        if !processors.process(format, path, &mut out).await {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, paths.len());
    }
    info!("Ingestion complete");
    Ok(())
}
