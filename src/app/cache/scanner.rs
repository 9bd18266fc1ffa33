//! Filesystem scanning for cleanup passes
//!
//! Walks the configured cache roots and describes every entry found with the
//! metadata the eviction policy needs. Scanning is best-effort: entries whose
//! metadata cannot be read are skipped, never fatal.

use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// A single filesystem entry observed during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Location of the entry
    pub path: PathBuf,
    /// When the entry was last accessed
    pub last_access: DateTime<Utc>,
    /// Space the entry occupies on disk
    pub allocated_size: u64,
    /// Whether the entry is a directory
    pub is_directory: bool,
}

impl CacheEntry {
    /// Describe the entry at `path` from its (non-followed) metadata
    ///
    /// Returns `None` when no usable timestamp is available.
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Option<Self> {
        let last_access = last_access_time(metadata)?;
        Some(Self {
            path,
            last_access,
            allocated_size: allocated_size(metadata),
            is_directory: metadata.is_dir(),
        })
    }
}

/// Walks a set of cache roots recursively
#[derive(Debug, Clone)]
pub struct ResourceScanner {
    roots: Vec<PathBuf>,
}

impl ResourceScanner {
    /// Create a scanner over the given roots
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// The roots this scanner walks
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Enumerate every entry below every root
    ///
    /// This is blocking filesystem work; run it off the async runtime.
    /// The roots themselves are not reported.
    pub fn scan(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        for root in &self.roots {
            if !root.is_dir() {
                debug!("Skipping missing cache root: {}", root.display());
                continue;
            }
            Self::scan_directory_recursive(root, &mut entries);
        }
        debug!(
            "Scanned {} entries across {} roots",
            entries.len(),
            self.roots.len()
        );
        entries
    }

    fn scan_directory_recursive(dir: &Path, entries: &mut Vec<CacheEntry>) {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!("Failed to read cache directory {}: {}", dir.display(), e);
                return;
            }
        };

        for dir_entry in read_dir.flatten() {
            let path = dir_entry.path();
            // DirEntry::metadata does not follow symlinks, so links never lead
            // the sweep outside the cache.
            let metadata = match dir_entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let is_directory = metadata.is_dir();
            match CacheEntry::from_metadata(path.clone(), &metadata) {
                Some(entry) => entries.push(entry),
                None => debug!("Skipping {}: no usable timestamps", path.display()),
            }

            if is_directory {
                Self::scan_directory_recursive(&path, entries);
            }
        }
    }
}

/// Last access time, falling back to modification time where the platform
/// does not track access
fn last_access_time(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata
        .accessed()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(unix)]
fn allocated_size(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;

    use crate::constants::files::UNIX_BLOCK_SIZE;

    metadata.blocks().saturating_mul(UNIX_BLOCK_SIZE)
}

#[cfg(not(unix))]
fn allocated_size(metadata: &Metadata) -> u64 {
    metadata.len()
}

/// Convert a `SystemTime` into the timestamp type used by cache entries
pub fn to_timestamp(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, FileTimes};
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_file(path: &Path, len: usize) {
        fs::write(path, vec![7u8; len]).unwrap();
    }

    #[test]
    fn test_scan_finds_nested_entries() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("posters");
        fs::create_dir(&nested).unwrap();
        write_file(&temp_dir.path().join("a.bin"), 100);
        write_file(&nested.join("b.bin"), 5000);

        let scanner = ResourceScanner::new(vec![temp_dir.path().to_path_buf()]);
        let entries = scanner.scan();

        assert_eq!(entries.len(), 3);
        let directories: Vec<_> = entries.iter().filter(|e| e.is_directory).collect();
        assert_eq!(directories.len(), 1);
        assert_eq!(directories[0].path, nested);
        assert!(entries
            .iter()
            .any(|e| e.path == nested.join("b.bin") && !e.is_directory));
    }

    #[test]
    fn test_scan_skips_missing_roots() {
        let temp_dir = TempDir::new().unwrap();
        write_file(&temp_dir.path().join("kept.bin"), 10);

        let scanner = ResourceScanner::new(vec![
            temp_dir.path().join("does-not-exist"),
            temp_dir.path().to_path_buf(),
        ]);

        let entries = scanner.scan();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, temp_dir.path().join("kept.bin"));
    }

    #[test]
    fn test_scan_reports_access_time() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("old.bin");
        write_file(&path, 10);

        let accessed = SystemTime::now() - Duration::from_secs(10 * 86_400);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_times(FileTimes::new().set_accessed(accessed))
            .unwrap();

        let entries = ResourceScanner::new(vec![temp_dir.path().to_path_buf()]).scan();
        let delta = (entries[0].last_access - to_timestamp(accessed))
            .num_seconds()
            .abs();
        assert!(delta <= 1, "access time drifted by {delta}s");
    }

    #[cfg(unix)]
    #[test]
    fn test_allocated_size_counts_blocks() {
        let temp_dir = TempDir::new().unwrap();
        write_file(&temp_dir.path().join("blob.bin"), 10_000);

        let entries = ResourceScanner::new(vec![temp_dir.path().to_path_buf()]).scan();
        assert_eq!(entries[0].allocated_size % 512, 0);
        assert!(entries[0].allocated_size > 0);
    }
}
