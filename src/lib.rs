//! Media Fetcher Library
//!
//! Two subsystems that manage shared, bounded resources for a media
//! application: a disk cache eviction engine that keeps cache directories
//! within an age and size budget, and a download coordinator that coalesces
//! concurrent fetches of the same remote resource into one transfer.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(KB, 1024);
        assert_eq!(GB, 1024 * MB);
        assert_eq!(HTTP_TIMEOUT.as_secs(), 300);
        assert!(USER_AGENT.contains("Media-Fetcher"));
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::from(errors::DownloadError::Cancelled);

        assert_eq!(app_error.category(), "download");
        assert!(app_error.to_string().contains("cancelled"));
    }
}
