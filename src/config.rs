//! Configuration management for Media Fetcher
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, multi-source loading, and zero-config defaults.
//! Values are layered: built-in defaults, then a TOML file, then environment
//! variables, then whatever the command line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ByteSize, CacheBudget, CacheConfig, ClientConfig};
use crate::constants::{cache, env, http, limits, logging};
use crate::errors::{AppError, ConfigError, Result};

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "media-fetcher.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Cache eviction settings
    pub cache: CacheConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Directories to sweep (empty = system cache directory)
    pub roots: Vec<PathBuf>,
    /// Maximum time since last access, e.g. "7days" or "12h"
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
    /// Maximum total size, e.g. "1GB" or a plain byte count
    pub max_size: ByteSize,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_age: cache::DEFAULT_MAX_AGE,
            max_size: ByteSize::b(cache::DEFAULT_MAX_BYTES),
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Whole-transfer timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// New transfers started per second
    pub rate_limit_rps: u32,
    /// Where in-progress transfers are written (None = system temp dir)
    pub staging_dir: Option<PathBuf>,
    /// Where downloads without a destination go (None = system cache dir)
    pub download_dir: Option<PathBuf>,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            staging_dir: None,
            download_dir: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (CacheConfig, ClientConfig) {
        (
            self.cache.to_runtime_config(),
            self.client.to_runtime_config(),
        )
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// Command-line overrides are applied by the caller afterwards.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(ref path) => Some(path.clone()),
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_overrides_from(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `MEDIA_FETCHER_*` overrides read through `lookup`
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env::CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            debug!("{} overrides cache roots", env::CACHE_DIR);
            self.cache.roots = vec![PathBuf::from(dir)];
        }

        if let Some(age) = lookup(env::MAX_AGE) {
            self.cache.max_age =
                humantime::parse_duration(age.trim()).map_err(|e| ConfigError::InvalidValue {
                    field: env::MAX_AGE.to_string(),
                    value: age.clone(),
                    reason: e.to_string(),
                })?;
        }

        if let Some(size) = lookup(env::MAX_SIZE) {
            self.cache.max_size = size.parse().map_err(|_| ConfigError::InvalidValue {
                field: env::MAX_SIZE.to_string(),
                value: size.clone(),
                reason: "Expected a size such as 500MB".to_string(),
            })?;
        }

        Ok(())
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");
        Self::write_default_config(&config_path).await?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::generic(format!("Failed to serialize configuration: {}", e)))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(LOCAL_CONFIG_FILE)];
        if let Ok(user_config) = Self::get_default_config_path() {
            search_paths.push(user_config);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir.join(cache::APP_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        let default_cache_path = dirs::cache_dir()
            .map(|dir| dir.join(cache::APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"));

        format!(
            r#"# Media Fetcher Configuration
# This file was automatically generated on first run.
# You can customize any of these settings to suit your needs.

[cache]
# Directories to keep within budget (empty = {})
roots = []

# Entries not accessed for this long are deleted (e.g. "12h", "7days", "1month")
max_age = "{}"

# Least recently used entries are deleted until the cache fits (e.g. "500MB", "2GB")
max_size = "{}"

[client]
# HTTP client settings
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = {}
pool_max_per_host = {}
request_timeout_secs = {}
connect_timeout_secs = {}
rate_limit_rps = {}
# staging_dir = "/path/to/staging"
# download_dir = "/path/to/downloads"

[logging]
level = "{}"  # error, warn, info, debug, trace
"#,
            default_cache_path.display(),
            humantime::format_duration(cache::DEFAULT_MAX_AGE),
            ByteSize::b(cache::DEFAULT_MAX_BYTES),
            http::POOL_IDLE_TIMEOUT.as_secs(),
            http::POOL_MAX_PER_HOST,
            http::DEFAULT_TIMEOUT.as_secs(),
            http::CONNECT_TIMEOUT.as_secs(),
            limits::DEFAULT_RATE_LIMIT_RPS,
            logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig
    pub fn to_runtime_config(&self) -> CacheConfig {
        CacheConfig {
            roots: self.roots.clone(),
            budget: CacheBudget::new(self.max_age, self.max_size),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
            staging_dir: self.staging_dir.clone(),
            download_dir: self
                .download_dir
                .clone()
                .unwrap_or_else(ClientConfig::default_download_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_default_config_creation() {
        let config = AppConfig::default();

        assert_eq!(config.cache.max_age, cache::DEFAULT_MAX_AGE);
        assert_eq!(config.cache.max_size.as_u64(), cache::DEFAULT_MAX_BYTES);
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content();

        // Should be valid TOML
        let parsed: AppConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed.cache.max_age, cache::DEFAULT_MAX_AGE);
        assert_eq!(parsed.cache.max_size, ByteSize::gb(1));
        assert_eq!(parsed.client.request_timeout_secs, 300);
        assert!(content.contains("# Media Fetcher Configuration"));
        assert!(content.contains("[cache]"));
        assert!(content.contains("[client]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_config_loading_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let test_config = r#"
[cache]
roots = ["/var/cache/posters", "/var/cache/audio"]
max_age = "2weeks"
max_size = "500MB"

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let mut config = AppConfig::load_from_file(&config_path).await.unwrap();
        config.apply_overrides_from(|_| None).unwrap();

        assert_eq!(config.cache.roots.len(), 2);
        assert_eq!(config.cache.max_age, Duration::from_secs(14 * cache::DAY_SECS));
        assert_eq!(config.cache.max_size, ByteSize::mb(500));
        assert_eq!(config.logging.level, "debug");

        // Unspecified sections keep their defaults
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
    }

    #[tokio::test]
    async fn test_invalid_file_is_format_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[cache]\nmax_size = \"lots\"\n")
            .await
            .unwrap();

        let result = AppConfig::load_from_file(&config_path).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = [
            (env::CACHE_DIR, "/tmp/override-cache"),
            (env::MAX_AGE, "3days"),
            (env::MAX_SIZE, "2GB"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cache.roots, vec![PathBuf::from("/tmp/override-cache")]);
        assert_eq!(config.cache.max_age, Duration::from_secs(3 * cache::DAY_SECS));
        assert_eq!(config.cache.max_size, ByteSize::gb(2));
    }

    #[test]
    fn test_invalid_environment_override() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides_from(|name| {
            (name == env::MAX_AGE).then(|| "sometime".to_string())
        });

        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_runtime_conversion() {
        let mut config = AppConfig::default();
        config.cache.roots = vec![PathBuf::from("/data/cache")];
        config.cache.max_size = ByteSize::mb(250);
        config.client.download_dir = Some(PathBuf::from("/data/downloads"));

        let (cache_config, client_config) = config.to_runtime_config();

        assert_eq!(cache_config.roots, vec![PathBuf::from("/data/cache")]);
        assert_eq!(cache_config.budget.max_bytes, 250 * cache::MB);
        assert_eq!(client_config.download_dir, PathBuf::from("/data/downloads"));
        assert_eq!(client_config.request_timeout, http::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed.cache.max_age, config.cache.max_age);
        assert_eq!(parsed.cache.max_size, config.cache.max_size);
    }
}
