//! Download keys and logical requests
//!
//! A [`DownloadKey`] is the canonical identity of a remote resource. A
//! [`DownloadRequest`] is one caller's interest in that resource, carrying the
//! callbacks its progress and outcome are delivered to.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use url::Url;

use crate::errors::{DownloadError, DownloadResult};

/// Progress callback: `(fraction, throughput in bytes per second)`
pub type ProgressCallback = Arc<dyn Fn(f64, f64) + Send + Sync>;

/// Completion callback, invoked exactly once with the terminal outcome
pub type CompletionCallback = Box<dyn FnOnce(DownloadResult<PathBuf>) + Send>;

/// Canonical identity of a remote resource
///
/// Built from an absolute URL with a host. The fragment is dropped since it
/// never reaches the server, so `https://x/a#top` and `https://x/a` share a
/// transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadKey {
    url: Url,
}

impl DownloadKey {
    /// Parse a URL string into a key
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::InvalidUrl` if the string is not an absolute
    /// URL or has no host
    pub fn parse(input: &str) -> DownloadResult<Self> {
        let mut url = Url::parse(input.trim()).map_err(|e| DownloadError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(DownloadError::InvalidUrl {
                url: input.to_string(),
                reason: "URL has no host".to_string(),
            });
        }

        url.set_fragment(None);
        Ok(Self { url })
    }

    /// The normalized URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The key as a string
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical caller's interest in a resource
pub struct DownloadRequest {
    /// Resource identity
    pub key: DownloadKey,
    /// Distinguishes independent callers targeting the same key
    pub dedupe_stamp: String,
    /// Where the caller wants the file; a generated path is used if None
    pub destination: Option<PathBuf>,
    /// When this request was created, used for its own throughput
    pub registered_at: Instant,
    /// Receives `(fraction, throughput)` updates
    pub on_progress: ProgressCallback,
    /// Receives the terminal outcome
    pub on_complete: CompletionCallback,
}

impl DownloadRequest {
    /// Create a request registered now
    pub fn new<P, C>(
        key: DownloadKey,
        dedupe_stamp: impl Into<String>,
        destination: Option<PathBuf>,
        on_progress: P,
        on_complete: C,
    ) -> Self
    where
        P: Fn(f64, f64) + Send + Sync + 'static,
        C: FnOnce(DownloadResult<PathBuf>) + Send + 'static,
    {
        Self {
            key,
            dedupe_stamp: dedupe_stamp.into(),
            destination,
            registered_at: Instant::now(),
            on_progress: Arc::new(on_progress),
            on_complete: Box::new(on_complete),
        }
    }

    /// Whether `other` addresses the same `(key, stamp)` pair
    pub fn same_identity(&self, other: &DownloadRequest) -> bool {
        self.key == other.key && self.dedupe_stamp == other.dedupe_stamp
    }
}

impl fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("key", &self.key.as_str())
            .field("dedupe_stamp", &self.dedupe_stamp)
            .field("destination", &self.destination)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}
