//! Channel-based download handles

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};

use crate::errors::{DownloadError, DownloadResult};

use super::CancellationHandle;

/// One progress update for a caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Completed fraction in `0.0..=1.0`
    pub fraction: f64,
    /// Bytes per second since this caller registered
    pub throughput: f64,
}

/// Handle to a requested download
///
/// Progress updates queue on an unbounded channel until read; the result
/// arrives once, when the shared transfer reaches its terminal state.
#[derive(Debug)]
pub struct DownloadTicket {
    progress: mpsc::UnboundedReceiver<DownloadProgress>,
    result: oneshot::Receiver<DownloadResult<PathBuf>>,
    handle: Option<CancellationHandle>,
}

impl DownloadTicket {
    pub(crate) fn new(
        progress: mpsc::UnboundedReceiver<DownloadProgress>,
        result: oneshot::Receiver<DownloadResult<PathBuf>>,
        handle: Option<CancellationHandle>,
    ) -> Self {
        Self {
            progress,
            result,
            handle,
        }
    }

    /// Whether this request started the underlying transfer
    pub fn started(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancellation handle, present if this request started the transfer
    pub fn cancellation(&self) -> Option<&CancellationHandle> {
        self.handle.as_ref()
    }

    /// Next progress update, or None once the transfer is over
    pub async fn next_progress(&mut self) -> Option<DownloadProgress> {
        self.progress.recv().await
    }

    /// Wait for the terminal outcome, discarding progress
    pub async fn wait(self) -> DownloadResult<PathBuf> {
        self.wait_with_progress(|_| {}).await
    }

    /// Wait for the terminal outcome, passing each progress update to `on_progress`
    pub async fn wait_with_progress<F>(self, mut on_progress: F) -> DownloadResult<PathBuf>
    where
        F: FnMut(DownloadProgress),
    {
        let DownloadTicket {
            mut progress,
            result,
            ..
        } = self;
        tokio::pin!(result);

        loop {
            tokio::select! {
                biased;
                Some(update) = progress.recv() => on_progress(update),
                outcome = &mut result => {
                    while let Ok(update) = progress.try_recv() {
                        on_progress(update);
                    }
                    // A dropped sender means the transfer task went away without an outcome.
                    return outcome.unwrap_or(Err(DownloadError::Cancelled));
                }
            }
        }
    }
}
