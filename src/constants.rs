//! Application constants for Media Fetcher
//!
//! This module centralizes all constants used throughout the crate,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names for configuration overrides
pub mod env {
    /// Overrides the single cache root directory
    pub const CACHE_DIR: &str = "MEDIA_FETCHER_CACHE_DIR";

    /// Overrides the maximum cache entry age (humantime format, e.g. "7days")
    pub const MAX_AGE: &str = "MEDIA_FETCHER_MAX_AGE";

    /// Overrides the maximum total cache size (e.g. "500MB")
    pub const MAX_SIZE: &str = "MEDIA_FETCHER_MAX_SIZE";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("Media-Fetcher/", env!("CARGO_PKG_VERSION"));

    /// Default timeout for a whole transfer
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 8;
}

/// Rate limiting configuration
pub mod limits {
    /// Default number of new transfers started per second
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 15;
}

/// Cache budget defaults and unit sizes
pub mod cache {
    use super::Duration;

    /// Seconds in a minute
    pub const MINUTE_SECS: u64 = 60;

    /// Seconds in an hour
    pub const HOUR_SECS: u64 = 60 * MINUTE_SECS;

    /// Seconds in a day
    pub const DAY_SECS: u64 = 24 * HOUR_SECS;

    /// Seconds in a week
    pub const WEEK_SECS: u64 = 7 * DAY_SECS;

    /// Seconds in a month (30 days)
    pub const MONTH_SECS: u64 = 30 * DAY_SECS;

    /// Seconds in a year (365 days)
    pub const YEAR_SECS: u64 = 365 * DAY_SECS;

    /// Bytes in a kilobyte
    pub const KB: u64 = 1024;

    /// Bytes in a megabyte
    pub const MB: u64 = 1024 * KB;

    /// Bytes in a gigabyte
    pub const GB: u64 = 1024 * MB;

    /// Default maximum age of a cached resource (one week)
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(WEEK_SECS);

    /// Default maximum total cache size (1 GB)
    pub const DEFAULT_MAX_BYTES: u64 = GB;

    /// Name of the application directory under the OS cache/config dirs
    pub const APP_DIR_NAME: &str = "media-fetcher";
}

/// File operation constants
pub mod files {
    /// Prefix for in-progress transfer files
    pub const STAGING_PREFIX: &str = "transfer-";

    /// Prefix for generated destinations when the caller gives none
    pub const DOWNLOAD_PREFIX: &str = "download-";

    /// Suffix for in-progress transfer files
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Block size used by `st_blocks` on Unix
    pub const UNIX_BLOCK_SIZE: u64 = 512;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

pub use cache::{DEFAULT_MAX_AGE, DEFAULT_MAX_BYTES, GB, KB, MB};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::DEFAULT_RATE_LIMIT_RPS;
