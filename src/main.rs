//! Media Fetcher CLI application
//!
//! Command-line interface for sweeping media caches and downloading remote
//! resources with coalesced transfers.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use media_fetcher::cli::{handle_cache, handle_config, handle_download, Cli, Commands};
use media_fetcher::config::{AppConfig, LoggingConfig};
use media_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let mut config = AppConfig::load(cli.global.config.clone()).await?;
    if let Some(cache_dir) = &cli.global.cache_dir {
        config.cache.roots = vec![cache_dir.clone()];
    }

    init_logging(&cli, &config.logging);
    info!("Media Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Cache(args) => {
            info!("Executing cache command");
            handle_cache(args, &config).await
        }
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, &config, !cli.global.quiet).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args, &config, cli.global.config.clone()).await
        }
    }
}

/// Initialize logging from CLI verbosity flags, falling back to the configured level
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| logging.level.clone());

    let mut filter = EnvFilter::from_default_env();
    match format!("media_fetcher={}", level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log level {:?}: {}", level, e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
