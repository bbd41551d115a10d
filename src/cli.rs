//! Command-line interface for dpseg
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Unsupervised acoustic unit discovery
#[derive(Parser, Debug)]
#[command(name = "dpseg", version, about = "Unsupervised acoustic unit discovery")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (TOML, or the legacy key:value format)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: per-sweep progress, -vv: every move)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Options shared by every command that runs the sampler.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Listing of index/feature file pairs
    #[arg(long, value_name = "FILE")]
    pub list: PathBuf,

    /// Directory receiving per-sweep labels and snapshots
    #[arg(long, value_name = "DIR")]
    pub results: PathBuf,

    /// Number of Gibbs sweeps (overrides the configuration)
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,

    /// Input files per batch group (overrides the configuration)
    #[arg(long, value_name = "N")]
    pub group_size: Option<usize>,

    /// Random seed for a reproducible run
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Score emissions on demand instead of precomputing them per group
    #[arg(long)]
    pub no_precompute: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load unlabeled data and train from scratch
    Train {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Continue training from a snapshot and labeled data
    Resume {
        /// Snapshot written by an earlier run
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        /// Drop clusters that had at most this many members
        #[arg(long, value_name = "N", default_value = "0")]
        threshold: usize,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Inspect configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Parse and validate a configuration file
    Check {
        /// File to check
        path: PathBuf,
    },
}
