//! Command-line argument parsing for Media Fetcher
//!
//! This module defines the CLI structure using clap derive macros, providing
//! commands for cache maintenance, coalesced downloads, and configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::app::ByteSize;

/// Media Fetcher - bounded media caches and coalesced downloads
#[derive(Parser, Debug)]
#[command(
    name = "media_fetcher",
    version,
    about = "Keep media caches within budget and download resources without duplicate transfers",
    long_about = "Sweeps cache directories by age and size, and downloads remote media with \
concurrent requests for the same URL sharing a single transfer."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path (replaces configured roots)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cache maintenance
    Cache(CacheArgs),

    /// Download one or more URLs
    Download(DownloadArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Delete expired entries, then least recently used ones until within budget
    Clean {
        /// Maximum time since last access (e.g. "12h", "7days")
        #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
        max_age: Option<Duration>,

        /// Maximum total size (e.g. "500MB", "2GB")
        #[arg(long, value_name = "SIZE")]
        max_size: Option<ByteSize>,

        /// Directory to sweep; repeat for several (replaces configured roots)
        #[arg(long = "root", value_name = "DIR")]
        roots: Vec<PathBuf>,
    },

    /// List cache contents and usage without deleting anything
    Scan {
        /// Print the inventory as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// URLs to download; duplicates share one transfer
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory to save files into (generated paths in the download dir if omitted)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Dedupe stamp; requests with different stamps are tracked independently
    #[arg(long, default_value = "")]
    pub stamp: String,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The logging level requested by flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl DownloadArgs {
    /// Destination for `url` under `--output`, if one was given
    ///
    /// The file name is the last path segment of the URL, or `index` when the
    /// URL has none.
    pub fn destination_for(&self, url: &str) -> Option<PathBuf> {
        let output = self.output.as_ref()?;
        let name = url::Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "index".to_string());
        Some(output.join(name))
    }
}
