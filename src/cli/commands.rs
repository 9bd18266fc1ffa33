//! Command handlers for Media Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments to
//! the cache engine, the download coordinator, and configuration management.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::app::cache::format_bytes;
use crate::app::{ByteSize, DiskCache, DownloadCoordinator, HttpTransport, Inventory, Transport};
use crate::cli::{CacheAction, CacheArgs, ConfigAction, ConfigArgs, DownloadArgs, ProgressDisplay};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Entries listed by `cache scan` before the output is truncated
const SCAN_LISTING_LIMIT: usize = 20;

/// Handle cache management commands
pub async fn handle_cache(args: CacheArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        CacheAction::Clean {
            max_age,
            max_size,
            roots,
        } => handle_cache_clean(config, max_age, max_size, roots).await,
        CacheAction::Scan { json } => handle_cache_scan(config, json).await,
    }
}

/// Run one cleanup pass and report what it did
async fn handle_cache_clean(
    config: &AppConfig,
    max_age: Option<Duration>,
    max_size: Option<ByteSize>,
    roots: Vec<PathBuf>,
) -> Result<()> {
    let mut cache_config = config.cache.to_runtime_config();
    if !roots.is_empty() {
        cache_config.roots = roots;
    }
    if let Some(max_age) = max_age {
        cache_config = cache_config.with_max_age(max_age);
    }
    if let Some(max_size) = max_size {
        cache_config = cache_config.with_max_bytes(max_size);
    }

    let cache = DiskCache::new(cache_config)?;
    let budget = cache.budget();
    info!(
        "Cleaning {} root(s) to max age {} and max size {}",
        cache.roots().len(),
        humantime::format_duration(budget.max_age),
        ByteSize::b(budget.max_bytes)
    );

    println!("🧹 Cache Cleanup");
    println!("===============");
    for root in cache.roots() {
        println!("Root: {}", root.display());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .map_err(|e| AppError::generic(format!("Progress template error: {}", e)))?
            .tick_strings(&["◐", "◓", "◑", "◒"]),
    );
    spinner.set_message("Scanning cache...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = cache.clean_expired().await;
    spinner.finish_and_clear();

    match report {
        Some(report) => {
            println!(
                "Scanned {} files in {} directories",
                report.files_scanned, report.directories_scanned
            );
            println!("Expired removed:  {}", report.expired_removed);
            println!("Oversize removed: {}", report.oversize_removed);
            if report.failed_removals > 0 {
                println!("⚠️  Failed removals: {}", report.failed_removals);
            }
            println!("Freed:     {}", format_bytes(report.bytes_freed));
            println!("Remaining: {}", format_bytes(report.bytes_remaining));
            println!(
                "Completed in {}",
                humantime::format_duration(Duration::from_millis(report.duration.as_millis() as u64))
            );
        }
        None => println!("A cleanup pass is already running; nothing was done."),
    }

    Ok(())
}

/// Show what the cache holds without deleting anything
async fn handle_cache_scan(config: &AppConfig, json: bool) -> Result<()> {
    let cache = DiskCache::new(config.cache.to_runtime_config())?;
    let inventory = cache.inventory().await;
    debug!("Scanned {} entries", inventory.entries.len());

    if json {
        let rendered = serde_json::to_string_pretty(&inventory)
            .map_err(|e| AppError::generic(format!("Failed to render inventory: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("💾 Cache Information");
    println!("===================");
    for root in cache.roots() {
        println!("Location: {}", root.display());
    }
    print_inventory(&inventory, &cache);
    Ok(())
}

fn print_inventory(inventory: &Inventory, cache: &DiskCache) {
    let budget = cache.budget();
    println!("Files: {}", inventory.file_count);
    println!("Directories: {}", inventory.directory_count);
    println!(
        "Cache size: {} (budget {})",
        inventory.format_total_size(),
        format_bytes(budget.max_bytes)
    );

    let files: Vec<_> = inventory.entries.iter().filter(|e| !e.is_directory).collect();
    if files.is_empty() {
        return;
    }

    println!();
    println!("{:<20} {:>12}  Path", "Last access", "Size");
    for entry in files.iter().take(SCAN_LISTING_LIMIT) {
        println!(
            "{:<20} {:>12}  {}",
            entry.last_access.format("%Y-%m-%d %H:%M:%S"),
            format_bytes(entry.allocated_size),
            entry.path.display()
        );
    }
    if files.len() > SCAN_LISTING_LIMIT {
        println!("... and {} more", files.len() - SCAN_LISTING_LIMIT);
    }
}

/// Handle the download command
///
/// Every URL is submitted to one coordinator, so repeated URLs share a
/// transfer. Fails if any download fails.
pub async fn handle_download(args: DownloadArgs, config: &AppConfig, show_progress: bool) -> Result<()> {
    let start_time = Instant::now();
    let client_config = config.client.to_runtime_config();
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&client_config)?);
    let coordinator = DownloadCoordinator::new(transport, client_config.download_dir.clone());
    info!("Downloading {} URL(s)", args.urls.len());

    let display = ProgressDisplay::new(show_progress)?;
    let waits = args.urls.iter().map(|url| {
        let bar = display.add(url);
        let ticket = coordinator.fetch(url, args.destination_for(url), args.stamp.clone());
        if !ticket.started() {
            debug!("{} shares an existing transfer", url);
        }
        async move {
            let result = ticket.wait_with_progress(|progress| bar.update(progress)).await;
            match &result {
                Ok(_) => bar.finish("done"),
                Err(e) => bar.abandon(format!("failed: {}", e)),
            }
            (url.clone(), result)
        }
    });
    let results = join_all(waits).await;

    let mut failed = 0;
    for (url, result) in &results {
        match result {
            Ok(path) => println!("✅ {} -> {}", url, path.display()),
            Err(e) => {
                failed += 1;
                warn!("Download of {} failed: {}", url, e);
                println!("❌ {}: {}", url, e);
            }
        }
    }

    println!(
        "Downloaded {} of {} in {}",
        results.len() - failed,
        results.len(),
        humantime::format_duration(Duration::from_secs(start_time.elapsed().as_secs()))
    );

    if failed > 0 {
        return Err(AppError::generic(format!("{} download(s) failed", failed)));
    }
    Ok(())
}

/// Handle configuration commands
pub async fn handle_config(
    args: ConfigArgs,
    config: &AppConfig,
    config_path: Option<PathBuf>,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { force } => handle_config_init(config_path, force).await,
        ConfigAction::Show => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn handle_config_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None if !force => {
            AppConfig::initialize_first_run().await?;
            return Ok(());
        }
        None => AppConfig::get_default_config_path()?,
    };

    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    AppConfig::write_default_config(&path).await?;
    println!("📁 Wrote default configuration file:");
    println!("   {}", path.display());
    Ok(())
}
