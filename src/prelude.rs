//! Prelude module for Media Fetcher Library
//!
//! Re-exports the items most integrations need, so a single
//! `use media_fetcher::prelude::*;` is enough for typical usage.
//!
//! # Usage
//!
//! ```rust,no_run
//! use media_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (cache_config, client_config) = AppConfig::load(None).await?.to_runtime_config();
//!
//!     let cache = DiskCache::new(cache_config)?;
//!     let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&client_config)?);
//!     let coordinator = DownloadCoordinator::new(transport, client_config.download_dir);
//!
//!     let path = coordinator.fetch("https://example.com/cover.jpg", None, "").wait().await?;
//!     println!("Saved {}", path.display());
//!     cache.clean_expired().await;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, DownloadError, Result};

// Cache engine
pub use crate::app::cache::{
    AgeUnit, ByteSize, CacheBudget, CacheConfig, CleanupReport, DiskCache, Inventory,
};

// Transfers and coalescing
pub use crate::app::client::{ClientConfig, HttpTransport, Transport};
pub use crate::app::coordinator::{
    CancellationHandle, DownloadCoordinator, DownloadProgress, DownloadTicket,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_MAX_AGE, DEFAULT_MAX_BYTES, GB, KB, MB};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
