//! Disk cache cleanup orchestration
//!
//! This module contains the [`DiskCache`] implementation: a single-flight
//! guard around scan → sort → age eviction → size eviction, run on the
//! blocking I/O pool so filesystem work never stalls the caller's task.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::constants::cache;
use crate::errors::{CacheError, CacheResult};

use super::config::{CacheBudget, CacheConfig};
use super::policy::EvictionPolicy;
use super::scanner::{to_timestamp, CacheEntry, ResourceScanner};
use super::stats::{CleanupReport, Inventory};

/// Source of "now" for age decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        to_timestamp(SystemTime::now())
    }
}

/// Time- and size-bounded cleanup of one or more cache directories
///
/// Construct one per set of roots and share it with `Arc`. Only one cleanup
/// pass runs at a time; a call made while a pass is in progress is dropped.
#[derive(Debug)]
pub struct DiskCache {
    /// Configuration
    config: CacheConfig,
    /// Walks the resolved roots
    scanner: Arc<ResourceScanner>,
    /// Eviction rules for the configured budget
    policy: EvictionPolicy,
    /// Time source for age checks
    clock: Arc<dyn Clock>,
    /// Set while a pass is running
    cleaning: Arc<AtomicBool>,
}

/// Clears the single-flight flag when a pass ends, even if it panics
#[derive(Debug)]
struct PassGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl DiskCache {
    /// Create a disk cache, creating its roots if necessary
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if no root can be determined or a root cannot be
    /// created
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let roots = if config.roots.is_empty() {
            vec![Self::get_default_cache_dir()?]
        } else {
            config.roots.clone()
        };

        for root in &roots {
            Self::ensure_directory_exists(root)?;
        }

        info!(
            "Initialized disk cache over {} root(s), max age {:?}, max size {} bytes",
            roots.len(),
            config.budget.max_age,
            config.budget.max_bytes
        );

        Ok(Self {
            policy: EvictionPolicy::new(config.budget),
            scanner: Arc::new(ResourceScanner::new(roots)),
            clock: Arc::new(SystemClock),
            cleaning: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The directories this cache sweeps
    pub fn roots(&self) -> &[PathBuf] {
        self.scanner.roots()
    }

    /// The cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The budget enforced by every pass
    pub fn budget(&self) -> CacheBudget {
        self.policy.budget()
    }

    /// Whether a cleanup pass is currently running
    pub fn is_cleaning(&self) -> bool {
        self.cleaning.load(Ordering::Acquire)
    }

    /// Default cache directory for the current OS
    ///
    /// - macOS: ~/Library/Caches/media-fetcher
    /// - Linux: ~/.cache/media-fetcher
    /// - Windows: %LOCALAPPDATA%/media-fetcher
    pub fn get_default_cache_dir() -> CacheResult<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join(cache::APP_DIR_NAME))
            .ok_or(CacheError::NoRoots)
    }

    fn ensure_directory_exists(path: &Path) -> CacheResult<()> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| {
                error!("Failed to create cache directory {}: {}", path.display(), e);
                CacheError::DirectoryNotAccessible {
                    path: path.to_path_buf(),
                }
            })?;
            debug!("Created cache directory: {}", path.display());
        }
        Ok(())
    }

    /// Claim the single-flight flag
    fn begin_pass(&self) -> Option<PassGuard> {
        self.cleaning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard {
                flag: Arc::clone(&self.cleaning),
            })
    }

    /// Delete expired entries, then least recently used entries until the
    /// cache fits its size budget
    ///
    /// Returns `None` without scanning or deleting anything if another pass
    /// is already running. The pass itself never fails; removal errors are
    /// logged and skipped.
    pub async fn clean_expired(&self) -> Option<CleanupReport> {
        let Some(guard) = self.begin_pass() else {
            debug!("Cleanup already in progress, ignoring request");
            return None;
        };

        Some(self.run_pass(guard).await)
    }

    /// Callback form of [`clean_expired`](Self::clean_expired)
    ///
    /// Returns `false` if a pass is already running, in which case
    /// `completion` is dropped without being called. Otherwise the pass runs
    /// in the background and `completion` is called once the flag has been
    /// cleared. Must be called from within a Tokio runtime.
    pub fn clean_expired_with<F>(&self, completion: F) -> bool
    where
        F: FnOnce(CleanupReport) + Send + 'static,
    {
        let Some(guard) = self.begin_pass() else {
            debug!("Cleanup already in progress, dropping completion");
            return false;
        };

        let scanner = Arc::clone(&self.scanner);
        let policy = self.policy;
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            let report = Self::sweep_in_background(guard, scanner, policy, clock).await;
            completion(report);
        });
        true
    }

    /// Scan the roots without deleting anything
    pub async fn inventory(&self) -> Inventory {
        let scanner = Arc::clone(&self.scanner);
        tokio::task::spawn_blocking(move || {
            let mut entries = scanner.scan();
            EvictionPolicy::sort_by_recency(&mut entries);
            Inventory::from_entries(entries)
        })
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to scan cache directories: {}", e);
            Inventory::default()
        })
    }

    async fn run_pass(&self, guard: PassGuard) -> CleanupReport {
        Self::sweep_in_background(
            guard,
            Arc::clone(&self.scanner),
            self.policy,
            Arc::clone(&self.clock),
        )
        .await
    }

    /// Run one pass on the blocking pool
    ///
    /// The guard moves into the blocking task, so the flag stays set until
    /// the sweep itself ends even if the awaiting future is dropped.
    async fn sweep_in_background(
        guard: PassGuard,
        scanner: Arc<ResourceScanner>,
        policy: EvictionPolicy,
        clock: Arc<dyn Clock>,
    ) -> CleanupReport {
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            Self::sweep(&scanner, &policy, clock.as_ref())
        })
        .await
        .unwrap_or_else(|e| {
            error!("Cleanup pass aborted: {}", e);
            CleanupReport::default()
        })
    }

    /// One complete pass; blocking
    fn sweep(scanner: &ResourceScanner, policy: &EvictionPolicy, clock: &dyn Clock) -> CleanupReport {
        let start = Instant::now();

        let entries = scanner.scan();
        let directories = entries.iter().filter(|e| e.is_directory).count();
        let files = entries.len() - directories;

        let outcome = policy.apply(entries, clock.now(), remove_entry);
        let report = CleanupReport::from_outcome(files, directories, &outcome, start.elapsed());

        if report.total_removed() > 0 || report.failed_removals > 0 {
            info!("Cache cleanup {}", report.summary());
        } else {
            debug!("Cache cleanup {}", report.summary());
        }
        report
    }
}

/// Best-effort removal; a file that is already gone counts as removed
fn remove_entry(entry: &CacheEntry) -> bool {
    match std::fs::remove_file(&entry.path) {
        Ok(()) => {
            debug!("Evicted {}", entry.path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to evict {}: {}", entry.path.display(), e);
            false
        }
    }
}
