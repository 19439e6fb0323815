//! vCenter CPU Ready analyzer CLI
//!
//! A command-line tool for analyzing CPU Ready exports from vCenter,
//! ranking host health and simulating host consolidation.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, intervals, settings, simulate, trends, IntervalChoice, Session};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// vCenter CPU Ready analyzer
#[derive(Parser)]
#[command(name = "cpuready")]
#[command(
    author,
    version,
    about = "CPU Ready analysis and host consolidation planning for vCenter exports",
    long_about = None
)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Config file (defaults to ~/.config/cpuready/config.json)
    #[arg(long, global = true, env = "CPUREADY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Collection interval: auto, real-time, last-day, last-week, last-month, last-year
    #[arg(long, short, global = true)]
    pub interval: Option<IntervalChoice>,

    /// Warning threshold in percent
    #[arg(long, global = true)]
    pub warning: Option<f64>,

    /// Critical threshold in percent
    #[arg(long, global = true)]
    pub critical: Option<f64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import exports and show a summary with per-host health
    Analyze {
        /// CSV exports to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Health scores and status per host, worst first
    Health {
        /// CSV exports to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Rank hosts from best to worst
    Compare {
        /// CSV exports to import
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Simulate removing hosts and redistributing their workload
    Simulate {
        /// CSV exports to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Host to remove (repeat or separate with commas)
        #[arg(long, short, required = true, value_delimiter = ',')]
        remove: Vec<String>,
    },

    /// Moving averages, slopes, peaks and hourly profile
    Trends {
        /// CSV exports to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only show this host
        #[arg(long)]
        host: Option<String>,
    },

    /// Daily mean CPU Ready per host as a weekly calendar
    Heatmap {
        /// CSV exports to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only show this host
        #[arg(long)]
        host: Option<String>,
    },

    /// Detect the collection interval of each export
    DetectInterval {
        /// CSV exports to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List the supported collection intervals
    Intervals,

    /// Show or initialize configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Config(ConfigCommands::Init { force }) => {
            return settings::init(cli.config.as_deref(), *force);
        }
        Commands::Intervals => return intervals::list(cli.format),
        _ => {}
    }

    let app_config = config::AppConfig::load(cli.config.as_deref())?.with_overrides(
        cli.interval,
        cli.warning,
        cli.critical,
    );
    if let Commands::Config(ConfigCommands::Show) = &cli.command {
        return settings::show(&app_config, cli.format);
    }

    let session = Session::new(app_config, cli.format)?;

    match cli.command {
        Commands::Analyze { files } => analyze::analyze(&session, &files).await?,
        Commands::Health { files } => analyze::health(&session, &files).await?,
        Commands::Compare { files } => analyze::compare(&session, &files).await?,
        Commands::Simulate { files, remove } => {
            simulate::simulate(&session, &files, remove).await?
        }
        Commands::Trends { files, host } => {
            trends::trends(&session, &files, host.as_deref()).await?
        }
        Commands::Heatmap { files, host } => {
            trends::heatmap(&session, &files, host.as_deref()).await?
        }
        Commands::DetectInterval { files } => intervals::detect(&session, &files).await?,
        Commands::Intervals | Commands::Config(_) => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}
