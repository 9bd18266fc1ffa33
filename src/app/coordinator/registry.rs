//! Keyed registry of pending download requests
//!
//! Maps each [`DownloadKey`] to the requests waiting on it. A key is present
//! exactly while one transfer for it is in flight. All mutation goes through
//! one mutex so an append can never slip between a terminal removal and the
//! delivery of its outcome. Callbacks always run after the lock is released.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::errors::DownloadResult;

use super::request::{DownloadKey, DownloadRequest, ProgressCallback};

/// Result of registering a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// First request for the key; the caller must start the transfer
    Started,
    /// New stamp for a key already in flight; rides the existing transfer
    Joined,
    /// Same `(key, stamp)` already pending; folded into that request
    Merged,
}

impl AppendOutcome {
    /// Whether the request was added as a new entry
    pub fn accepted(self) -> bool {
        !matches!(self, AppendOutcome::Merged)
    }
}

/// A registered request plus callers merged into it
#[derive(Debug)]
struct Entry {
    seq: u64,
    request: DownloadRequest,
    merged: Vec<(u64, DownloadRequest)>,
}

impl Entry {
    fn callers(&self) -> impl Iterator<Item = (u64, &DownloadRequest)> {
        std::iter::once((self.seq, &self.request))
            .chain(self.merged.iter().map(|(seq, request)| (*seq, request)))
    }

    fn into_callers(self) -> impl Iterator<Item = (u64, DownloadRequest)> {
        std::iter::once((self.seq, self.request)).chain(self.merged)
    }
}

#[derive(Debug, Default)]
struct State {
    next_seq: u64,
    pending: HashMap<DownloadKey, Vec<Entry>>,
}

/// Key to pending-requests map with de-duplication and fan-out
#[derive(Debug, Default)]
pub struct TransferRegistry {
    state: Mutex<State>,
}

impl TransferRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Callbacks never run under the lock, so a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request under its key
    ///
    /// A request whose `(key, stamp)` is already pending is not added as a
    /// new entry; its callbacks are folded into the pending one so the caller
    /// still hears the shared outcome.
    pub fn append(&self, request: DownloadRequest) -> AppendOutcome {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        let entries = state.pending.entry(request.key.clone()).or_default();
        if let Some(existing) = entries
            .iter_mut()
            .find(|entry| entry.request.same_identity(&request))
        {
            tracing::debug!(
                "Merged request for {} (stamp {:?})",
                request.key,
                request.dedupe_stamp
            );
            existing.merged.push((seq, request));
            return AppendOutcome::Merged;
        }

        let outcome = if entries.is_empty() {
            AppendOutcome::Started
        } else {
            AppendOutcome::Joined
        };
        entries.push(Entry {
            seq,
            request,
            merged: Vec::new(),
        });
        outcome
    }

    /// Deliver a progress event to every caller waiting on `key`
    ///
    /// Each caller's throughput is measured from its own registration time.
    /// Does nothing when the expected size is unknown.
    pub fn resolve_progress(
        &self,
        key: &DownloadKey,
        bytes_written: u64,
        total_written: u64,
        total_expected: u64,
    ) {
        if total_expected == 0 {
            return;
        }

        let listeners: Vec<(u64, Instant, ProgressCallback)> = {
            let state = self.lock();
            let Some(entries) = state.pending.get(key) else {
                return;
            };
            let mut listeners: Vec<_> = entries
                .iter()
                .flat_map(|entry| entry.callers())
                .map(|(seq, request)| (seq, request.registered_at, request.on_progress.clone()))
                .collect();
            listeners.sort_by_key(|(seq, _, _)| *seq);
            listeners
        };

        tracing::trace!(
            "{}: +{} bytes ({}/{})",
            key,
            bytes_written,
            total_written,
            total_expected
        );

        let fraction = total_written as f64 / total_expected as f64;
        let now = Instant::now();
        for (_, registered_at, on_progress) in listeners {
            let elapsed = now.duration_since(registered_at).as_secs_f64();
            let throughput = if elapsed > 0.0 {
                total_written as f64 / elapsed
            } else {
                0.0
            };
            on_progress(fraction, throughput);
        }
    }

    /// Remove every request for `key` and hand each the outcome
    ///
    /// Removal is a single step under the lock; completions then run in
    /// registration order. Returns how many callers were notified.
    pub fn resolve_terminal(&self, key: &DownloadKey, outcome: DownloadResult<PathBuf>) -> usize {
        match &outcome {
            Ok(path) => tracing::debug!("{} completed at {}", key, path.display()),
            Err(e) => tracing::debug!("{} failed: {}", key, e),
        }
        self.resolve_terminal_with(key, |_| outcome.clone())
    }

    /// Like [`resolve_terminal`](Self::resolve_terminal), with the outcome
    /// chosen per caller
    ///
    /// `outcome_for` runs outside the lock, once per caller in registration
    /// order, right before that caller's completion.
    pub fn resolve_terminal_with<F>(&self, key: &DownloadKey, mut outcome_for: F) -> usize
    where
        F: FnMut(&DownloadRequest) -> DownloadResult<PathBuf>,
    {
        let Some(entries) = self.lock().pending.remove(key) else {
            return 0;
        };

        let mut callers: Vec<(u64, DownloadRequest)> =
            entries.into_iter().flat_map(|entry| entry.into_callers()).collect();
        callers.sort_by_key(|(seq, _)| *seq);
        tracing::debug!("Notifying {} caller(s) for {}", callers.len(), key);

        let notified = callers.len();
        for (_, request) in callers {
            let outcome = outcome_for(&request);
            (request.on_complete)(outcome);
        }
        notified
    }

    /// Whether a transfer for `key` is in flight
    pub fn contains(&self, key: &DownloadKey) -> bool {
        self.lock().pending.contains_key(key)
    }

    /// Number of callers waiting on `key`, merged callers included
    pub fn waiter_count(&self, key: &DownloadKey) -> usize {
        self.lock()
            .pending
            .get(key)
            .map_or(0, |entries| entries.iter().map(|e| 1 + e.merged.len()).sum())
    }

    /// Distinct stamps pending for `key`, in registration order
    pub fn stamps(&self, key: &DownloadKey) -> Vec<String> {
        self.lock().pending.get(key).map_or_else(Vec::new, |entries| {
            entries
                .iter()
                .map(|e| e.request.dedupe_stamp.clone())
                .collect()
        })
    }

    /// Number of keys with a transfer in flight
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether no transfer is in flight
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DownloadError;
    use std::sync::Arc;

    fn key(url: &str) -> DownloadKey {
        DownloadKey::parse(url).unwrap()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(key: &DownloadKey, stamp: &str, label: &str, log: &Log) -> DownloadRequest {
        let progress_log = Arc::clone(log);
        let complete_log = Arc::clone(log);
        let progress_label = label.to_string();
        let complete_label = label.to_string();
        DownloadRequest::new(
            key.clone(),
            stamp,
            None,
            move |fraction, _| {
                progress_log
                    .lock()
                    .unwrap()
                    .push(format!("{progress_label}:{fraction:.2}"));
            },
            move |result: DownloadResult<PathBuf>| {
                let status = match result {
                    Ok(_) => "ok".to_string(),
                    Err(e) => e.to_string(),
                };
                complete_log
                    .lock()
                    .unwrap()
                    .push(format!("{complete_label}:{status}"));
            },
        )
    }

    #[test]
    fn test_append_outcomes() {
        let registry = TransferRegistry::new();
        let log = Log::default();
        let k = key("https://x.example/a");

        assert_eq!(registry.append(recording(&k, "s", "a", &log)), AppendOutcome::Started);
        assert_eq!(registry.append(recording(&k, "s", "b", &log)), AppendOutcome::Merged);
        assert_eq!(registry.append(recording(&k, "t", "c", &log)), AppendOutcome::Joined);

        assert!(!AppendOutcome::Merged.accepted());
        assert!(AppendOutcome::Joined.accepted());
        assert_eq!(registry.waiter_count(&k), 3);
        assert_eq!(registry.stamps(&k), vec!["s".to_string(), "t".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_progress_fans_out_in_registration_order() {
        let registry = TransferRegistry::new();
        let log = Log::default();
        let k = key("https://x.example/a");

        registry.append(recording(&k, "1", "first", &log));
        registry.append(recording(&k, "2", "second", &log));
        registry.append(recording(&k, "1", "merged", &log));

        registry.resolve_progress(&k, 50, 50, 200);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:0.25", "second:0.25", "merged:0.25"]
        );
    }

    #[test]
    fn test_progress_ignored_without_expected_size() {
        let registry = TransferRegistry::new();
        let log = Log::default();
        let k = key("https://x.example/a");
        registry.append(recording(&k, "", "a", &log));

        registry.resolve_progress(&k, 10, 10, 0);
        registry.resolve_progress(&key("https://x.example/other"), 10, 10, 100);

        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_terminal_removes_key_and_notifies_in_order() {
        let registry = TransferRegistry::new();
        let log = Log::default();
        let k = key("https://x.example/a");

        registry.append(recording(&k, "1", "a", &log));
        registry.append(recording(&k, "2", "b", &log));
        registry.append(recording(&k, "1", "c", &log));
        registry.append(recording(&k, "3", "d", &log));

        let notified = registry.resolve_terminal(&k, Err(DownloadError::HttpStatus(404)));

        assert_eq!(notified, 4);
        assert!(!registry.contains(&k));
        let log = log.lock().unwrap();
        let labels: Vec<&str> = log.iter().map(|l| &l[..1]).collect();
        assert_eq!(labels, vec!["a", "b", "c", "d"]);
        assert!(log.iter().all(|l| l.ends_with("HTTP 404")));
    }

    #[test]
    fn test_terminal_outcome_per_caller() {
        let registry = TransferRegistry::new();
        let log = Log::default();
        let k = key("https://x.example/a");

        registry.append(recording(&k, "1", "a", &log));
        registry.append(recording(&k, "2", "b", &log));

        let mut asked = Vec::new();
        let notified = registry.resolve_terminal_with(&k, |request| {
            asked.push(request.dedupe_stamp.clone());
            if request.dedupe_stamp == "1" {
                Ok(PathBuf::from("/tmp/a"))
            } else {
                Err(DownloadError::Cancelled)
            }
        });

        assert_eq!(notified, 2);
        assert_eq!(asked, vec!["1", "2"]);
        assert_eq!(*log.lock().unwrap(), vec!["a:ok", "b:Download was cancelled"]);
        assert!(!registry.contains(&k));
    }

    #[test]
    fn test_terminal_for_unknown_key_is_noop() {
        let registry = TransferRegistry::new();
        assert_eq!(
            registry.resolve_terminal(&key("https://x.example/a"), Err(DownloadError::Cancelled)),
            0
        );
    }

    #[test]
    fn test_append_after_terminal_starts_fresh() {
        let registry = TransferRegistry::new();
        let log = Log::default();
        let k = key("https://x.example/a");

        registry.append(recording(&k, "", "a", &log));
        registry.resolve_terminal(&k, Ok(PathBuf::from("/tmp/a")));

        assert_eq!(registry.append(recording(&k, "", "b", &log)), AppendOutcome::Started);
        assert_eq!(registry.waiter_count(&k), 1);
    }

    #[test]
    fn test_callback_may_reenter_registry() {
        let registry = Arc::new(TransferRegistry::new());
        let k = key("https://x.example/a");

        let inner = Arc::clone(&registry);
        let retry_key = k.clone();
        registry.append(DownloadRequest::new(k.clone(), "", None, |_, _| {}, move |_| {
            // Retrying from a completion must not deadlock.
            inner.append(DownloadRequest::new(retry_key, "", None, |_, _| {}, |_| {}));
        }));

        registry.resolve_terminal(&k, Err(DownloadError::HttpStatus(503)));
        assert_eq!(registry.waiter_count(&k), 1);
    }
}
