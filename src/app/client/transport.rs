//! Transport abstraction for streaming downloads
//!
//! A transport fetches one URL into a temporary file, reporting progress on a
//! channel as bytes arrive, and resolves once the transfer has finished. The
//! coordinator never talks to the network directly; it drives a
//! `Transport`, which keeps it testable without a server.

use futures::future::BoxFuture;
use tempfile::TempPath;
use tokio::sync::mpsc;
use url::Url;

use crate::errors::TransportError;

/// A progress notification from a running transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes written by this step
    pub bytes_written: u64,
    /// Bytes written so far
    pub total_written: u64,
    /// Expected body length, 0 if unknown
    pub total_expected: u64,
}

/// How a transfer ended when the server answered
#[derive(Debug)]
pub struct TransferResponse {
    /// HTTP status code
    pub status: u16,
    /// The downloaded body; only present for successful statuses
    pub body: Option<TempPath>,
}

impl TransferResponse {
    /// A response whose body was written to `body`
    pub fn downloaded(status: u16, body: TempPath) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// A response whose body was not kept
    pub fn status_only(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Final result of a transfer
pub type TransferResult = Result<TransferResponse, TransportError>;

/// Something that can stream a URL to a temporary file
pub trait Transport: Send + Sync + 'static {
    /// Start fetching `url`
    ///
    /// Progress is sent on `progress` in the order bytes are written. The
    /// returned future must be `'static`; dropping it cancels the transfer.
    fn transfer(
        &self,
        url: Url,
        progress: mpsc::UnboundedSender<TransferProgress>,
    ) -> BoxFuture<'static, TransferResult>;
}
