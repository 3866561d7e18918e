//! CLI parse: clap types for adbatch. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// adbatch - batch product ad image generation across image providers
#[derive(Parser)]
#[command(name = "adbatch")]
#[command(about = "Generate product advertisement images in batches across AI image providers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate images for every row of a product feed
    Process {
        /// JSON product feed
        feed: PathBuf,
        /// Output directory (overrides output.dir)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Concurrent provider calls (overrides dispatch.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Attempts per item (overrides dispatch.max_retries)
        #[arg(long)]
        max_retries: Option<u32>,
        /// Checkpoint file for resuming interrupted runs
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Print the admission plan without calling providers
        #[arg(long)]
        dry_run: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate configuration and report errors and warnings
    ValidateConfig,
    /// List configured providers
    Providers {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Summarize a checkpoint file
    Checkpoint {
        /// Checkpoint file
        file: PathBuf,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Process { .. } => "process",
            Commands::ValidateConfig => "validate-config",
            Commands::Providers { .. } => "providers",
            Commands::Checkpoint { .. } => "checkpoint",
        }
    }
}
