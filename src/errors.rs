//! Error types for Media Fetcher
//!
//! This module defines the error types for every component of the crate.
//! Download errors are cheap to clone because a single transfer outcome is
//! fanned out to every caller waiting on the same resource.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Shared, clonable wrapper around an underlying transport failure
pub type TransportError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Download and coalescing errors
///
/// Every waiter registered for a resource receives exactly one of these (or a
/// success) once the underlying transfer reaches a terminal state.
#[derive(Error, Debug, Clone)]
pub enum DownloadError {
    /// The resource identifier could not be parsed into a download key
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Server returned a status outside the 2xx range
    #[error("Server responded with HTTP {0}")]
    HttpStatus(u16),

    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(#[source] TransportError),

    /// The completed download could not be moved into place
    #[error("Failed to persist download to {path}: {source}")]
    PersistFailure {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The underlying transfer was cancelled for every waiter
    #[error("Download was cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Wrap any transport error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Arc::new(error))
    }

    /// Build a persist failure for `path`
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistFailure {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Check whether re-invoking the download might succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            DownloadError::Transport(_) | DownloadError::Cancelled => true,
            DownloadError::HttpStatus(status) => *status == 429 || *status >= 500,
            DownloadError::InvalidUrl { .. } | DownloadError::PersistFailure { .. } => false,
        }
    }
}

/// Cache management errors
///
/// Cleanup passes never fail; these are only raised while setting a cache up.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache directory not found or could not be created
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// No cache roots were configured and no default could be determined
    #[error("No cache directories configured")]
    NoRoots,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// The HTTP client could not be built from the configuration
    #[error("Failed to build HTTP client")]
    HttpClient(#[from] reqwest::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Download(_) => "download",
            AppError::Cache(_) => "cache",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_is_clone() {
        let error = DownloadError::transport(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        let copy = error.clone();

        assert!(copy.to_string().contains("reset by peer"));
        assert!(matches!(copy, DownloadError::Transport(_)));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(DownloadError::HttpStatus(503).is_recoverable());
        assert!(DownloadError::HttpStatus(429).is_recoverable());
        assert!(!DownloadError::HttpStatus(404).is_recoverable());
        assert!(DownloadError::Cancelled.is_recoverable());
        assert!(!DownloadError::InvalidUrl {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_persist_failure_message() {
        let error = DownloadError::persist(
            "/tmp/out.bin",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(error.to_string().contains("/tmp/out.bin"));
    }

    #[test]
    fn test_app_error_category() {
        let app_error = AppError::from(DownloadError::HttpStatus(404));
        assert_eq!(app_error.category(), "download");

        let app_error = AppError::from(CacheError::NoRoots);
        assert_eq!(app_error.category(), "cache");
    }
}
