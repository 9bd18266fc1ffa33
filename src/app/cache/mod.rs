//! Disk cache eviction engine
//!
//! Keeps a set of cache directories within an age and size budget. A cleanup
//! pass scans every root, ranks entries by last access, deletes everything
//! older than the maximum age, then keeps deleting the least recently used
//! files until the total allocated size fits the budget.
//!
//! # Key Features
//!
//! - **Single-flight passes**: a request made while a pass runs is dropped, not queued
//! - **Off-runtime I/O**: scanning and deletion run on the blocking pool
//! - **Best-effort deletion**: removal failures are logged and never abort a pass
//! - **Multiple roots**: one budget can span several directories
//!
//! # Module Organization
//!
//! - [`config`] - Budget, units and configuration
//! - [`scanner`] - Filesystem enumeration
//! - [`policy`] - Pure eviction rules
//! - [`stats`] - Cleanup reports and inventories
//! - [`manager`] - The [`DiskCache`] itself
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! use media_fetcher::app::cache::{AgeUnit, ByteSize, CacheConfig, DiskCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::with_cache_root(PathBuf::from("/var/cache/posters"))
//!     .with_max_age(AgeUnit::Weeks.of(2))
//!     .with_max_bytes(ByteSize::mb(500));
//! let cache = DiskCache::new(config)?;
//!
//! match cache.clean_expired().await {
//!     Some(report) => println!("Cache cleanup {}", report.summary()),
//!     None => println!("A cleanup pass is already running"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod policy;
pub mod scanner;
pub mod stats;

// Re-export main public API
pub use config::{AgeUnit, ByteSize, CacheBudget, CacheConfig};
pub use manager::{Clock, DiskCache, SystemClock};
pub use policy::{EvictionOutcome, EvictionPolicy};
pub use scanner::{CacheEntry, ResourceScanner};
pub use stats::{format_bytes, CleanupReport, Inventory};
