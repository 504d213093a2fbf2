use std::path::PathBuf;
use std::time::Duration;

use amulet_core::{Rarity, ViewSettings};
use amulet_engine::{DispatcherSettings, WriterSettings};
use amulet_logging::LogDestination;
use anyhow::{ensure, Context};
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;

use super::app::PipelineConfig;

/// Where diagnostics go. Stdout is reserved for the rendered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

/// Reads posts from stdin, one per line, and keeps the amulets.
#[derive(Debug, Parser)]
#[command(name = "amulet-collector", version, about)]
pub struct Cli {
    /// Classifier worker threads [default: available parallelism]
    #[arg(long, env = "AMULET_WORKERS")]
    pub workers: Option<usize>,

    /// Hide matches below this rarity (1 = common .. 7 = mythic)
    #[arg(
        long,
        env = "AMULET_MIN_RARITY",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(1..=7)
    )]
    pub min_rarity: u8,

    /// Most entries shown in the view
    #[arg(long, env = "AMULET_MAX_ENTRIES", default_value_t = 100)]
    pub max_entries: usize,

    /// Seed the store from the match log at startup (default)
    #[arg(long, overrides_with = "no_load_history")]
    pub load_history: bool,

    /// Start with an empty store
    #[arg(long, overrides_with = "load_history")]
    pub no_load_history: bool,

    /// Append-only match log
    #[arg(long, env = "AMULET_LOG_FILE", default_value = "amulets.json")]
    pub log_file: PathBuf,

    /// Matches per durable write
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Longest a match waits in memory before it is written
    #[arg(long, default_value_t = 1000)]
    pub flush_interval_ms: u64,

    /// How long shutdown may take to drain workers and the writer
    #[arg(long, default_value_t = 5000)]
    pub shutdown_grace_ms: u64,

    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log_destination: LogTarget,

    /// Diagnostics file used by the `file` and `both` destinations
    #[arg(long, default_value = "amulet.log")]
    pub diagnostics_file: PathBuf,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_destination(&self) -> LogDestination {
        match self.log_destination {
            LogTarget::File => LogDestination::File(self.diagnostics_file.clone()),
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both(self.diagnostics_file.clone()),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let min_rarity = Rarity::new(self.min_rarity)
            .with_context(|| format!("min rarity {} is out of range", self.min_rarity))?;
        ensure!(self.max_entries > 0, "--max-entries must be at least 1");
        ensure!(self.batch_size > 0, "--batch-size must be at least 1");
        ensure!(
            self.flush_interval_ms > 0,
            "--flush-interval-ms must be at least 1"
        );

        let mut dispatcher = DispatcherSettings::default();
        if let Some(workers) = self.workers {
            ensure!(workers > 0, "--workers must be at least 1");
            dispatcher.worker_count = workers;
        }

        Ok(PipelineConfig {
            view: ViewSettings {
                min_rarity,
                max_entries: self.max_entries,
                load_history: !self.no_load_history,
                ..ViewSettings::default()
            },
            dispatcher,
            writer: WriterSettings {
                batch_size: self.batch_size,
                flush_interval: Duration::from_millis(self.flush_interval_ms),
                ..WriterSettings::default()
            },
            log_file: self.log_file.clone(),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        })
    }
}
