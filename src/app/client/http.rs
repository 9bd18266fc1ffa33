//! reqwest-backed transport with rate-limited transfer starts
//!
//! Streams response bodies chunk by chunk into a staging file and reports
//! progress after every chunk. Retries are deliberately absent: a failed
//! transfer is reported once and callers decide whether to try again.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use url::Url;

use crate::constants::files;
use crate::errors::{ConfigError, ConfigResult, TransportError};

use super::config::ClientConfig;
use super::transport::{TransferProgress, TransferResponse, TransferResult, Transport};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// Production [`Transport`] over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    rate_limiter: Arc<DirectRateLimiter>,
    staging_dir: PathBuf,
}

impl HttpTransport {
    /// Creates a transport from the client configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero or the HTTP client
    /// cannot be built
    pub fn new(config: &ClientConfig) -> ConfigResult<Self> {
        let client = config.build_http_client()?;
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter: Arc::new(rate_limiter),
            staging_dir: config.staging_dir(),
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn stream_to_file(
        client: Client,
        rate_limiter: Arc<DirectRateLimiter>,
        staging_dir: PathBuf,
        url: Url,
        progress: mpsc::UnboundedSender<TransferProgress>,
    ) -> TransferResult {
        // Apply rate limiting with jitter to avoid thundering herd
        rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let mut response = client.get(url.clone()).send().await.map_err(wrap)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{} answered HTTP {}", url, status.as_u16());
            return Ok(TransferResponse::status_only(status.as_u16()));
        }

        let total_expected = response.content_length().unwrap_or(0);

        tokio::fs::create_dir_all(&staging_dir).await.map_err(wrap)?;
        let temp_path = tempfile::Builder::new()
            .prefix(files::STAGING_PREFIX)
            .suffix(files::TEMP_FILE_SUFFIX)
            .tempfile_in(&staging_dir)
            .map_err(wrap)?
            .into_temp_path();

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(wrap)?;
        let mut total_written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(wrap)? {
            file.write_all(&chunk).await.map_err(wrap)?;
            total_written += chunk.len() as u64;
            // The receiver goes away once the coordinator stops listening.
            let _ = progress.send(TransferProgress {
                bytes_written: chunk.len() as u64,
                total_written,
                total_expected,
            });
        }
        file.flush().await.map_err(wrap)?;

        tracing::debug!("Fetched {} ({} bytes)", url, total_written);
        Ok(TransferResponse::downloaded(status.as_u16(), temp_path))
    }
}

impl Transport for HttpTransport {
    fn transfer(
        &self,
        url: Url,
        progress: mpsc::UnboundedSender<TransferProgress>,
    ) -> BoxFuture<'static, TransferResult> {
        Box::pin(Self::stream_to_file(
            self.client.clone(),
            Arc::clone(&self.rate_limiter),
            self.staging_dir.clone(),
            url,
            progress,
        ))
    }
}

fn wrap<E>(error: E) -> TransportError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}
