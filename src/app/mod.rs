//! Core application logic for Media Fetcher
//!
//! This module contains the disk cache eviction engine, the HTTP transport,
//! and the download coordinator that coalesces concurrent fetches.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use media_fetcher::app::{
//!     CacheConfig, ClientConfig, DiskCache, DownloadCoordinator, HttpTransport,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Keep the cache within its budget
//! let cache = DiskCache::new(CacheConfig::default())?;
//! if let Some(report) = cache.clean_expired().await {
//!     println!("Freed {} bytes", report.bytes_freed);
//! }
//!
//! // Fetch a resource; concurrent callers for the same URL share one transfer
//! let transport = Arc::new(HttpTransport::new(&ClientConfig::default())?);
//! let coordinator = DownloadCoordinator::new(transport, ClientConfig::default().download_dir);
//! let ticket = coordinator.fetch("https://example.com/poster.jpg", None, "");
//! let path = ticket.wait().await?;
//! println!("Saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod coordinator;

// Re-export main public API
pub use cache::{
    AgeUnit, ByteSize, CacheBudget, CacheConfig, CacheEntry, CleanupReport, Clock, DiskCache,
    EvictionPolicy, Inventory, ResourceScanner, SystemClock,
};
pub use client::{ClientConfig, HttpTransport, Transport, TransferProgress, TransferResponse};
pub use coordinator::{
    AppendOutcome, CancellationHandle, DownloadCoordinator, DownloadKey, DownloadProgress,
    DownloadRequest, DownloadTicket, TransferRegistry,
};
