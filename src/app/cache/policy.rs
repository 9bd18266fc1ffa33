//! Age- and size-bounded eviction policy
//!
//! Decides which scanned entries a cleanup pass deletes. Entries are ranked by
//! last access (most recent first) and evicted from the least recently used
//! end: first everything older than the budget's maximum age, then as many
//! further entries as needed to bring the total size within the budget.
//!
//! Only files are candidates. Directories are neither evicted nor counted.

use chrono::{DateTime, Utc};

use super::config::CacheBudget;
use super::scanner::CacheEntry;

/// Result of applying the policy to one scan
#[derive(Debug, Clone, Default)]
pub struct EvictionOutcome {
    /// Entries removed for exceeding the maximum age, least recent first
    pub expired: Vec<CacheEntry>,
    /// Entries removed to satisfy the size limit, least recent first
    pub oversize: Vec<CacheEntry>,
    /// Number of removal attempts that failed
    pub failed_removals: usize,
    /// Surviving files, most recent first
    pub retained: Vec<CacheEntry>,
    /// Total allocated size of the surviving files
    pub retained_bytes: u64,
}

impl EvictionOutcome {
    /// All removed entries in the order they were removed
    pub fn removed(&self) -> impl Iterator<Item = &CacheEntry> {
        self.expired.iter().chain(self.oversize.iter())
    }

    /// Bytes released by the removals
    pub fn bytes_freed(&self) -> u64 {
        self.removed()
            .fold(0u64, |acc, e| acc.saturating_add(e.allocated_size))
    }
}

/// Pure eviction rules for a [`CacheBudget`]
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    budget: CacheBudget,
}

impl EvictionPolicy {
    pub fn new(budget: CacheBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> CacheBudget {
        self.budget
    }

    /// Whether `entry` was last accessed more than `max_age` before `now`
    pub fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // An age too large to represent never expires anything.
        chrono::Duration::from_std(self.budget.max_age)
            .ok()
            .and_then(|max_age| entry.last_access.checked_add_signed(max_age))
            .map_or(false, |deadline| deadline < now)
    }

    /// Order entries most recently accessed first
    ///
    /// The sort is stable, so ties keep scan order.
    pub fn sort_by_recency(entries: &mut [CacheEntry]) {
        entries.sort_by(|a, b| b.last_access.cmp(&a.last_access));
    }

    /// The ordered set of entries a pass would delete if every removal
    /// succeeded
    pub fn select(&self, entries: Vec<CacheEntry>, now: DateTime<Utc>) -> Vec<CacheEntry> {
        let outcome = self.apply(entries, now, |_| true);
        outcome.expired.into_iter().chain(outcome.oversize).collect()
    }

    /// Run both eviction phases, calling `remove` for each victim
    ///
    /// `remove` returns whether the entry is gone. An entry whose removal
    /// fails stays in the working set and keeps counting toward the size
    /// total, so the size phase may try it again.
    pub fn apply<F>(&self, entries: Vec<CacheEntry>, now: DateTime<Utc>, mut remove: F) -> EvictionOutcome
    where
        F: FnMut(&CacheEntry) -> bool,
    {
        let mut files: Vec<CacheEntry> = entries.into_iter().filter(|e| !e.is_directory).collect();
        Self::sort_by_recency(&mut files);

        let mut outcome = EvictionOutcome::default();

        // Age phase, least recently accessed first.
        let mut survivors = Vec::with_capacity(files.len());
        for entry in files.into_iter().rev() {
            if self.is_expired(&entry, now) {
                if remove(&entry) {
                    outcome.expired.push(entry);
                    continue;
                }
                outcome.failed_removals += 1;
            }
            survivors.push(entry);
        }

        // Size phase over what is left, still least recent first.
        let mut total = survivors
            .iter()
            .fold(0u64, |acc, e| acc.saturating_add(e.allocated_size));
        let mut retained = Vec::with_capacity(survivors.len());
        for entry in survivors {
            if total > self.budget.max_bytes {
                if remove(&entry) {
                    total = total.saturating_sub(entry.allocated_size);
                    outcome.oversize.push(entry);
                    continue;
                }
                outcome.failed_removals += 1;
            }
            retained.push(entry);
        }

        retained.reverse();
        outcome.retained = retained;
        outcome.retained_bytes = total;
        outcome
    }
}
