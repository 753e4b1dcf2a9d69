//! Tether command-line driver
//!
//! Small demos that exercise the run loop, the worker pool and the join
//! combinator end to end.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tether_core::{JoinMode, Scheduler, SchedulerConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Cooperative run loop demos", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of blocking worker threads (0 = one per CPU)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Scheduler configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join timer-delayed operations that each return their index
    Fanout {
        /// Completion delay of each operation, in milliseconds
        #[arg(short, long, value_delimiter = ',', default_value = "30,10,20")]
        delays: Vec<u64>,
        /// How the join treats failures
        #[arg(short, long, value_enum, default_value_t = Mode::Collect)]
        mode: Mode,
        /// Make the operation at this index fail
        #[arg(short, long)]
        fail: Option<usize>,
    },

    /// Show that zero-delay work runs after the current handler
    Order,

    /// Read files on the worker pool and report their sizes in argument order
    Read {
        /// Files to read
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Wait for every operation and keep each outcome
    Collect,
    /// Stop at the first failure
    FailFast,
}

impl From<Mode> for JoinMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Collect => JoinMode::Collect,
            Mode::FailFast => JoinMode::FailFast,
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

/// Resolve the scheduler configuration: flags > environment > file > defaults
fn load_config(path: Option<&PathBuf>, workers: Option<usize>) -> anyhow::Result<SchedulerConfig> {
    let config = match path {
        Some(path) => SchedulerConfig::from_file(path)?,
        None => SchedulerConfig::default(),
    };
    let mut config = config.apply_env()?;
    if let Some(workers) = workers {
        config = config.with_io_workers(workers);
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_ref(), cli.workers)?;
    tracing::debug!(?config, "scheduler configuration");
    let scheduler = Scheduler::with_config(config);

    match cli.command {
        Commands::Fanout { delays, mode, fail } => {
            commands::fanout::execute(&scheduler, &delays, mode.into(), fail)
        }
        Commands::Order => commands::order::execute(&scheduler),
        Commands::Read { files } => commands::read::execute(&scheduler, files),
    }
}
