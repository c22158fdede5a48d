//! CLI argument structures

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Aggregate numeric records in parallel chunks
#[derive(Debug, Parser)]
#[command(name = "chunkagg")]
#[command(about = "chunkagg - chunked parallel sum/min/max/parity aggregation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Aggregate the numbers in an inclusive range
    Run(RunArgs),
    /// Print the effective engine configuration as TOML
    Config(ConfigArgs),
}

/// Settings shared by every command that builds an engine configuration
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Records per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Run at most this many workers at once (default: one per chunk)
    #[arg(short = 'j', long)]
    pub max_workers: Option<usize>,

    /// Overall timeout for the run (e.g. "30s", "2m")
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// First number in the range
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub start: i64,

    /// Last number in the range (inclusive)
    #[arg(long, default_value_t = 1_000_000, allow_negative_numbers = true)]
    pub end: i64,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Check the result against a sequential single pass
    #[arg(long)]
    pub verify: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())
}
