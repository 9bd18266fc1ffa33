//! Cleanup reports and cache inventory statistics
//!
//! This module provides the summaries returned by cleanup passes and by
//! read-only inventory scans, plus human-readable byte formatting.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use super::policy::EvictionOutcome;
use super::scanner::CacheEntry;

/// Summary of one completed cleanup pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Files seen by the scan
    pub files_scanned: usize,
    /// Directories seen by the scan
    pub directories_scanned: usize,
    /// Files removed for exceeding the maximum age
    pub expired_removed: usize,
    /// Files removed to satisfy the size limit
    pub oversize_removed: usize,
    /// Removal attempts that failed and were ignored
    pub failed_removals: usize,
    /// Allocated bytes released
    pub bytes_freed: u64,
    /// Allocated bytes still held by surviving files
    pub bytes_remaining: u64,
    /// Removed paths in removal order
    pub removed: Vec<PathBuf>,
    /// Wall-clock time of the pass
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl CleanupReport {
    /// Build a report from a scan and the policy's outcome
    pub fn from_outcome(
        files_scanned: usize,
        directories_scanned: usize,
        outcome: &EvictionOutcome,
        duration: Duration,
    ) -> Self {
        Self {
            files_scanned,
            directories_scanned,
            expired_removed: outcome.expired.len(),
            oversize_removed: outcome.oversize.len(),
            failed_removals: outcome.failed_removals,
            bytes_freed: outcome.bytes_freed(),
            bytes_remaining: outcome.retained_bytes,
            removed: outcome.removed().map(|e| e.path.clone()).collect(),
            duration,
        }
    }

    /// Total number of files removed
    pub fn total_removed(&self) -> usize {
        self.expired_removed + self.oversize_removed
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "removed {} of {} files ({} expired, {} over size), freed {}, {} remaining",
            self.total_removed(),
            self.files_scanned,
            self.expired_removed,
            self.oversize_removed,
            format_bytes(self.bytes_freed),
            format_bytes(self.bytes_remaining)
        )
    }
}

/// Read-only view of what a cache currently holds
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    /// Every scanned entry, most recently accessed first
    pub entries: Vec<CacheEntry>,
    /// Number of files
    pub file_count: usize,
    /// Number of directories
    pub directory_count: usize,
    /// Total allocated size of all files
    pub total_bytes: u64,
}

impl Inventory {
    /// Tally a list of scanned entries
    pub fn from_entries(entries: Vec<CacheEntry>) -> Self {
        let (file_count, directory_count, total_bytes) =
            entries
                .iter()
                .fold((0, 0, 0u64), |(files, dirs, bytes), entry| {
                    if entry.is_directory {
                        (files, dirs + 1, bytes)
                    } else {
                        (files + 1, dirs, bytes.saturating_add(entry.allocated_size))
                    }
                });

        Self {
            entries,
            file_count,
            directory_count,
            total_bytes,
        }
    }

    /// Format total size in human-readable format
    pub fn format_total_size(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(path: &str, size: u64, is_directory: bool) -> CacheEntry {
        CacheEntry {
            path: PathBuf::from(path),
            last_access: Utc::now(),
            allocated_size: size,
            is_directory,
        }
    }

    #[test]
    fn test_inventory_tallies_files_and_directories() {
        let inventory = Inventory::from_entries(vec![
            entry("/c/a", 100, false),
            entry("/c/d", 4096, true),
            entry("/c/d/b", 300, false),
        ]);

        assert_eq!(inventory.file_count, 2);
        assert_eq!(inventory.directory_count, 1);
        assert_eq!(inventory.total_bytes, 400);
        assert_eq!(inventory.format_total_size(), "400 B");
    }

    #[test]
    fn test_report_from_outcome() {
        let outcome = EvictionOutcome {
            expired: vec![entry("/c/old", 2048, false)],
            oversize: vec![entry("/c/big", 1024, false)],
            failed_removals: 1,
            retained: vec![entry("/c/new", 512, false)],
            retained_bytes: 512,
        };

        let report = CleanupReport::from_outcome(4, 0, &outcome, Duration::from_millis(5));
        assert_eq!(report.total_removed(), 2);
        assert_eq!(report.bytes_freed, 3072);
        assert_eq!(report.bytes_remaining, 512);
        assert_eq!(
            report.removed,
            vec![PathBuf::from("/c/old"), PathBuf::from("/c/big")]
        );
        assert!(report.summary().contains("3.00 KB"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.50 GB");
    }
}
