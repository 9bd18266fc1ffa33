//! Integration tests for the disk cache eviction engine
//!
//! These tests drive `DiskCache` through its public API against real
//! temporary directories, with a pinned clock so ages are exact.

use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::oneshot;

use media_fetcher::app::cache::{AgeUnit, ByteSize, CacheConfig, Clock, DiskCache, ResourceScanner};

#[derive(Debug)]
struct PinnedClock(DateTime<Utc>);

impl Clock for PinnedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Write a file and back-date its access time
fn write_aged(dir: &Path, name: &str, len: usize, age: Duration) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, vec![0xAB; len]).unwrap();
    File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_times(FileTimes::new().set_accessed(SystemTime::now() - age))
        .unwrap();
    path
}

fn pinned_now() -> Arc<PinnedClock> {
    Arc::new(PinnedClock(Utc::now()))
}

#[tokio::test]
async fn test_only_entries_past_max_age_are_removed() {
    let temp_dir = TempDir::new().unwrap();
    let old = write_aged(temp_dir.path(), "old.jpg", 1024, AgeUnit::Days.of(10));
    let middle = write_aged(temp_dir.path(), "middle.jpg", 1024, AgeUnit::Days.of(5));
    let fresh = write_aged(temp_dir.path(), "fresh.jpg", 1024, AgeUnit::Days.of(1));

    let config = CacheConfig::with_cache_root(temp_dir.path().to_path_buf())
        .with_max_age(AgeUnit::Days.of(7))
        .with_max_bytes(ByteSize::gb(1));
    let cache = DiskCache::new(config).unwrap().with_clock(pinned_now());

    let report = cache.clean_expired().await.unwrap();

    assert!(!old.exists());
    assert!(middle.exists());
    assert!(fresh.exists());
    assert_eq!(report.expired_removed, 1);
    assert_eq!(report.oversize_removed, 0);
    assert_eq!(report.removed, vec![old]);
}

#[tokio::test]
async fn test_size_budget_spans_all_roots_and_evicts_oldest_first() {
    let temp_dir = TempDir::new().unwrap();
    let posters = temp_dir.path().join("posters");
    let audio = temp_dir.path().join("audio");

    let oldest = write_aged(&posters, "a/1.jpg", 8192, Duration::from_secs(5 * 3600));
    let older = write_aged(&audio, "2.mp3", 8192, Duration::from_secs(4 * 3600));
    let newer = write_aged(&posters, "b/3.jpg", 8192, Duration::from_secs(3 * 3600));
    let newest = write_aged(&audio, "nested/4.mp3", 8192, Duration::from_secs(3600));

    // Allow exactly the two newest files, as the filesystem sizes them.
    let scanner = ResourceScanner::new(vec![posters.clone(), audio.clone()]);
    let sizes: Vec<(PathBuf, u64)> = scanner
        .scan()
        .into_iter()
        .filter(|e| !e.is_directory)
        .map(|e| (e.path, e.allocated_size))
        .collect();
    let size_of = |p: &Path| sizes.iter().find(|(q, _)| q == p).unwrap().1;
    let limit = size_of(&newer) + size_of(&newest);

    let config = CacheConfig::with_cache_root(posters)
        .with_root(audio)
        .with_max_age(AgeUnit::Weeks.of(1))
        .with_max_bytes(limit);
    let cache = DiskCache::new(config).unwrap().with_clock(pinned_now());

    let report = cache.clean_expired().await.unwrap();

    assert_eq!(report.removed, vec![oldest.clone(), older.clone()]);
    assert!(!oldest.exists());
    assert!(!older.exists());
    assert!(newer.exists());
    assert!(newest.exists());
    assert!(report.bytes_remaining <= limit);

    // Directories are left in place even when emptied.
    assert!(oldest.parent().unwrap().is_dir());
}

#[tokio::test]
async fn test_pass_over_missing_root_is_harmless() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("cache");
    let cache = DiskCache::new(CacheConfig::with_cache_root(root.clone())).unwrap();

    fs::remove_dir_all(&root).unwrap();
    let report = cache.clean_expired().await.unwrap();

    assert_eq!(report.files_scanned, 0);
    assert_eq!(report.total_removed(), 0);
}

#[tokio::test]
async fn test_rejected_pass_never_completes() {
    let temp_dir = TempDir::new().unwrap();
    write_aged(temp_dir.path(), "stale.bin", 512, AgeUnit::Years.of(1));
    let cache = Arc::new(
        DiskCache::new(CacheConfig::with_cache_root(temp_dir.path().to_path_buf())).unwrap(),
    );

    let completions = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = oneshot::channel();

    let counter = Arc::clone(&completions);
    assert!(cache.clean_expired_with(move |report| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = done_tx.send(report);
    }));

    // The flag is claimed before the first call returns, so this one is dropped.
    let counter = Arc::clone(&completions);
    assert!(!cache.clean_expired_with(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(cache.clean_expired().await.is_none());

    let report = done_rx.await.unwrap();
    tokio::task::yield_now().await;

    assert_eq!(report.expired_removed, 1);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!cache.is_cleaning());

    // Once the pass has finished, new passes are accepted again.
    let again = cache.clean_expired().await.unwrap();
    assert_eq!(again.total_removed(), 0);
}

#[tokio::test]
async fn test_inventory_reports_without_deleting() {
    let temp_dir = TempDir::new().unwrap();
    let stale = write_aged(temp_dir.path(), "stale.bin", 2048, AgeUnit::Years.of(2));
    write_aged(temp_dir.path(), "dir/fresh.bin", 2048, Duration::from_secs(60));

    let config = CacheConfig::with_cache_root(temp_dir.path().to_path_buf())
        .with_max_age(AgeUnit::Days.of(1))
        .with_max_bytes(0u64);
    let cache = DiskCache::new(config).unwrap();

    let inventory = cache.inventory().await;

    assert_eq!(inventory.file_count, 2);
    assert_eq!(inventory.directory_count, 1);
    assert!(inventory.total_bytes >= 4096);
    assert!(stale.exists());
    assert_eq!(inventory.entries.last().unwrap().path, stale);
}
