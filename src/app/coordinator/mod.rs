//! Download coordination with request coalescing
//!
//! The [`DownloadCoordinator`] owns at most one underlying transfer per
//! resource. Callers asking for a resource that is already being fetched are
//! attached to the running transfer instead of starting another one, and
//! every caller receives the same progress stream and terminal outcome.
//!
//! # Key Features
//!
//! - **One transfer per key**: concurrent requests for a URL share a single fetch
//! - **Dedupe stamps**: independent callers are tracked separately but still share the fetch
//! - **Fan-out**: progress and outcome are delivered to every waiter
//! - **Persist before success**: files are moved into place before anyone hears `Ok`
//! - **Shared cancellation**: cancelling a transfer cancels it for all waiters
//!
//! # Module Organization
//!
//! - [`request`] - Keys, requests and callback types
//! - [`registry`] - The [`TransferRegistry`] map
//! - [`ticket`] - Channel-based handles returned by [`DownloadCoordinator::fetch`]

pub mod registry;
pub mod request;
pub mod ticket;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{AbortHandle, AbortRegistration, Abortable, Aborted};
use tokio::sync::{mpsc, oneshot};

use crate::app::client::{
    copy_into_place, generated_destination, persist_download, TransferResponse, TransferResult,
    Transport,
};
use crate::errors::{DownloadError, DownloadResult};

pub use registry::{AppendOutcome, TransferRegistry};
pub use request::{CompletionCallback, DownloadKey, DownloadRequest, ProgressCallback};
pub use ticket::{DownloadProgress, DownloadTicket};

/// Cancels the single transfer behind a key, for every waiter
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    key: DownloadKey,
    abort: AbortHandle,
}

impl CancellationHandle {
    /// Abort the transfer; all waiters receive `DownloadError::Cancelled`
    ///
    /// Has no effect once the transfer has finished.
    pub fn cancel(&self) {
        tracing::debug!("Cancelling transfer for {}", self.key);
        self.abort.abort();
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    /// The key whose transfer this handle controls
    pub fn key(&self) -> &DownloadKey {
        &self.key
    }
}

/// Coalescing download manager
///
/// Cheap to clone; clones share the registry and transport.
#[derive(Clone)]
pub struct DownloadCoordinator {
    transport: Arc<dyn Transport>,
    registry: Arc<TransferRegistry>,
    download_dir: PathBuf,
}

impl fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("registry", &self.registry)
            .field("download_dir", &self.download_dir)
            .finish_non_exhaustive()
    }
}

impl DownloadCoordinator {
    /// Create a coordinator
    ///
    /// Downloads requested without a destination are placed in
    /// `download_dir`.
    pub fn new(transport: Arc<dyn Transport>, download_dir: PathBuf) -> Self {
        Self {
            transport,
            registry: Arc::new(TransferRegistry::new()),
            download_dir,
        }
    }

    /// Request a download of `url`
    ///
    /// An invalid URL is reported through `on_complete` before this returns,
    /// and nothing is registered. Otherwise the request joins the transfer
    /// already running for the URL or starts a new one. A request with the
    /// same URL and `dedupe_stamp` as a pending one is merged into it.
    ///
    /// The file is persisted to the starting request's destination, or a
    /// generated path under the download directory. Every other waiter that
    /// named a different destination gets its own copy there; waiters without
    /// one receive the persisted path.
    ///
    /// Returns a cancellation handle only when this call started the
    /// transfer. Must be called within a Tokio runtime.
    pub fn download<P, C>(
        &self,
        url: &str,
        destination: Option<PathBuf>,
        dedupe_stamp: impl Into<String>,
        on_progress: P,
        on_complete: C,
    ) -> Option<CancellationHandle>
    where
        P: Fn(f64, f64) + Send + Sync + 'static,
        C: FnOnce(DownloadResult<PathBuf>) + Send + 'static,
    {
        let key = match DownloadKey::parse(url) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Rejected download request: {}", e);
                on_complete(Err(e));
                return None;
            }
        };

        let request = DownloadRequest::new(
            key.clone(),
            dedupe_stamp,
            destination.clone(),
            on_progress,
            on_complete,
        );

        match self.registry.append(request) {
            AppendOutcome::Started => Some(self.start_transfer(key, destination)),
            AppendOutcome::Joined => {
                tracing::debug!("Joined in-flight transfer for {}", key);
                None
            }
            AppendOutcome::Merged => None,
        }
    }

    /// Channel form of [`download`](Self::download)
    ///
    /// The returned ticket yields progress updates and resolves to the
    /// terminal outcome.
    pub fn fetch(
        &self,
        url: &str,
        destination: Option<PathBuf>,
        dedupe_stamp: impl Into<String>,
    ) -> DownloadTicket {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        let handle = self.download(
            url,
            destination,
            dedupe_stamp,
            move |fraction, throughput| {
                let _ = progress_tx.send(DownloadProgress {
                    fraction,
                    throughput,
                });
            },
            move |result| {
                let _ = result_tx.send(result);
            },
        );

        DownloadTicket::new(progress_rx, result_rx, handle)
    }

    /// Whether a transfer for `url` is in flight
    pub fn is_in_flight(&self, url: &str) -> bool {
        DownloadKey::parse(url).is_ok_and(|key| self.registry.contains(&key))
    }

    /// Number of transfers in flight
    pub fn in_flight_count(&self) -> usize {
        self.registry.len()
    }

    /// The registry backing this coordinator
    pub fn registry(&self) -> &TransferRegistry {
        &self.registry
    }

    /// Directory for downloads without an explicit destination
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    fn start_transfer(&self, key: DownloadKey, destination: Option<PathBuf>) -> CancellationHandle {
        let (abort, registration) = AbortHandle::new_pair();
        tracing::info!("Starting transfer for {}", key);

        tokio::spawn(drive_transfer(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            key.clone(),
            destination,
            self.download_dir.clone(),
            registration,
        ));

        CancellationHandle { key, abort }
    }
}

/// Run one transfer to its terminal state and resolve the key
async fn drive_transfer(
    transport: Arc<dyn Transport>,
    registry: Arc<TransferRegistry>,
    key: DownloadKey,
    destination: Option<PathBuf>,
    download_dir: PathBuf,
    registration: AbortRegistration,
) {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let transfer = Abortable::new(transport.transfer(key.url().clone(), progress_tx), registration);
    tokio::pin!(transfer);

    let result: Result<TransferResult, Aborted> = loop {
        tokio::select! {
            biased;
            Some(step) = progress_rx.recv() => {
                registry.resolve_progress(&key, step.bytes_written, step.total_written, step.total_expected);
            }
            result = &mut transfer => break result,
        }
    };

    while let Ok(step) = progress_rx.try_recv() {
        registry.resolve_progress(&key, step.bytes_written, step.total_written, step.total_expected);
    }

    let outcome = match result {
        Err(Aborted) => Err(DownloadError::Cancelled),
        Ok(Err(e)) => Err(DownloadError::Transport(e)),
        Ok(Ok(response)) => finish_transfer(&key, response, destination, &download_dir).await,
    };

    match outcome {
        Ok(persisted) => deliver(registry, key, persisted).await,
        Err(e) => {
            tracing::warn!("Download of {} failed: {}", key, e);
            registry.resolve_terminal(&key, Err(e));
        }
    }
}

/// Resolve a successful transfer, placing a copy at every other destination
/// a waiter asked for
///
/// Waiters without a destination of their own share the persisted file. A
/// waiter whose copy fails receives `PersistFailure`; the others still
/// succeed.
async fn deliver(registry: Arc<TransferRegistry>, key: DownloadKey, persisted: PathBuf) {
    let resolved_key = key.clone();
    let resolved = tokio::task::spawn_blocking(move || {
        let mut copies: HashMap<PathBuf, DownloadResult<PathBuf>> = HashMap::new();
        registry.resolve_terminal_with(&resolved_key, |request| match &request.destination {
            Some(wanted) if *wanted != persisted => copies
                .entry(wanted.clone())
                .or_insert_with(|| {
                    copy_into_place(&persisted, wanted).map_err(|e| {
                        tracing::warn!("Failed to place {} at {}: {}", resolved_key, wanted.display(), e);
                        DownloadError::persist(wanted.as_path(), e)
                    })
                })
                .clone(),
            _ => Ok(persisted.clone()),
        })
    })
    .await;

    if let Err(e) = resolved {
        tracing::error!("Delivering {} to its waiters failed: {}", key, e);
    }
}

/// Map a finished response to an outcome, persisting the body on success
async fn finish_transfer(
    key: &DownloadKey,
    response: TransferResponse,
    destination: Option<PathBuf>,
    download_dir: &Path,
) -> DownloadResult<PathBuf> {
    if !response.is_success() {
        return Err(DownloadError::HttpStatus(response.status));
    }

    let body = response.body.ok_or_else(|| {
        DownloadError::transport(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "transfer finished without a body",
        ))
    })?;

    let destination = match destination {
        Some(path) => path,
        None => generated_destination(download_dir, key.url())
            .map_err(|e| DownloadError::persist(download_dir, e))?,
    };

    let target = destination.clone();
    tokio::task::spawn_blocking(move || persist_download(body, &target))
        .await
        .map_err(|e| DownloadError::persist(&destination, io::Error::new(io::ErrorKind::Other, e)))?
        .map_err(|e| DownloadError::persist(&destination, e))
}
