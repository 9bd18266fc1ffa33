//! Cache configuration types and defaults
//!
//! This module contains the configuration structures for the eviction
//! engine: the age/size budget, the roots to sweep, and the unit helpers
//! used to express them.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::cache;
use crate::errors::ConfigError;

/// Age and size limits a cleanup pass enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBudget {
    /// Entries not accessed for longer than this are deleted
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
    /// Total allocated size the cache may keep after a pass
    pub max_bytes: u64,
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self {
            max_age: cache::DEFAULT_MAX_AGE,
            max_bytes: cache::DEFAULT_MAX_BYTES,
        }
    }
}

impl CacheBudget {
    /// Create a budget from an age and a byte count
    pub fn new(max_age: Duration, max_bytes: impl Into<ByteSize>) -> Self {
        Self {
            max_age,
            max_bytes: max_bytes.into().as_u64(),
        }
    }
}

/// Units a maximum age can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    /// 30 days
    Months,
    /// 365 days
    Years,
}

impl AgeUnit {
    /// Number of seconds in one unit
    pub fn seconds(self) -> u64 {
        match self {
            AgeUnit::Minutes => cache::MINUTE_SECS,
            AgeUnit::Hours => cache::HOUR_SECS,
            AgeUnit::Days => cache::DAY_SECS,
            AgeUnit::Weeks => cache::WEEK_SECS,
            AgeUnit::Months => cache::MONTH_SECS,
            AgeUnit::Years => cache::YEAR_SECS,
        }
    }

    /// Duration of `amount` units, saturating on overflow
    pub fn of(self, amount: u64) -> Duration {
        Duration::from_secs(amount.saturating_mul(self.seconds()))
    }
}

/// A byte count, parsed from and rendered as `"512KB"`, `"1.5GB"` etc.
///
/// Units are 1024-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Raw byte count
    pub const fn b(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Kilobytes
    pub const fn kb(amount: u64) -> Self {
        Self(amount.saturating_mul(cache::KB))
    }

    /// Megabytes
    pub const fn mb(amount: u64) -> Self {
        Self(amount.saturating_mul(cache::MB))
    }

    /// Gigabytes
    pub const fn gb(amount: u64) -> Self {
        Self(amount.saturating_mul(cache::GB))
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (amount, unit) = match self.0 {
            0 => (0, "B"),
            b if b % cache::GB == 0 => (b / cache::GB, "GB"),
            b if b % cache::MB == 0 => (b / cache::MB, "MB"),
            b if b % cache::KB == 0 => (b / cache::KB, "KB"),
            b => (b, "B"),
        };
        write!(f, "{}{}", amount, unit)
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "size".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(invalid("Expected a number such as 500MB"));
        }

        let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => cache::KB,
            "M" | "MB" | "MIB" => cache::MB,
            "G" | "GB" | "GIB" => cache::GB,
            _ => return Err(invalid("Unknown unit, expected B, KB, MB or GB")),
        };

        if let Ok(whole) = number.parse::<u64>() {
            return whole
                .checked_mul(multiplier)
                .map(Self)
                .ok_or_else(|| invalid("Size overflows 64 bits"));
        }

        let fractional: f64 = number
            .parse()
            .map_err(|_| invalid("Expected a number such as 500MB"))?;
        let bytes = (fractional * multiplier as f64).round();
        if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
            return Err(invalid("Size overflows 64 bits"));
        }
        Ok(Self(bytes as u64))
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ByteSizeVisitor;

        impl<'de> Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte count or a string such as \"500MB\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<ByteSize, E> {
                Ok(ByteSize(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<ByteSize, E> {
                u64::try_from(value)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte count cannot be negative"))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<ByteSize, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

/// Configuration for the disk cache eviction engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directories to sweep (OS-specific cache directory if empty)
    pub roots: Vec<PathBuf>,
    /// Limits enforced by every cleanup pass
    pub budget: CacheBudget,
}

impl CacheConfig {
    /// Create a configuration sweeping a single root
    pub fn with_cache_root(cache_root: PathBuf) -> Self {
        Self {
            roots: vec![cache_root],
            ..Default::default()
        }
    }

    /// Add another root to sweep
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.roots.push(root);
        self
    }

    /// Set the whole budget
    pub fn with_budget(mut self, budget: CacheBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Set the maximum entry age
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.budget.max_age = max_age;
        self
    }

    /// Set the maximum total size
    pub fn with_max_bytes(mut self, max_bytes: impl Into<ByteSize>) -> Self {
        self.budget.max_bytes = max_bytes.into().as_u64();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.roots.is_empty());
        assert_eq!(config.budget.max_age, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.budget.max_bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::with_cache_root(PathBuf::from("/tmp/images"))
            .with_root(PathBuf::from("/tmp/audio"))
            .with_max_age(AgeUnit::Days.of(3))
            .with_max_bytes(ByteSize::mb(250));

        assert_eq!(
            config.roots,
            vec![PathBuf::from("/tmp/images"), PathBuf::from("/tmp/audio")]
        );
        assert_eq!(config.budget.max_age, Duration::from_secs(3 * 86_400));
        assert_eq!(config.budget.max_bytes, 250 * 1024 * 1024);
    }

    #[test]
    fn test_age_units() {
        assert_eq!(AgeUnit::Minutes.of(2), Duration::from_secs(120));
        assert_eq!(AgeUnit::Hours.of(1), Duration::from_secs(3600));
        assert_eq!(AgeUnit::Weeks.of(1), AgeUnit::Days.of(7));
        assert_eq!(AgeUnit::Months.of(1), AgeUnit::Days.of(30));
        assert_eq!(AgeUnit::Years.of(1), AgeUnit::Days.of(365));
        assert_eq!(AgeUnit::Years.of(u64::MAX), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_byte_size_parsing() {
        assert_eq!("1024".parse::<ByteSize>().unwrap(), ByteSize::kb(1));
        assert_eq!("500MB".parse::<ByteSize>().unwrap(), ByteSize::mb(500));
        assert_eq!("2 gb".parse::<ByteSize>().unwrap(), ByteSize::gb(2));
        assert_eq!("1.5KB".parse::<ByteSize>().unwrap(), ByteSize::b(1536));
        assert!("lots".parse::<ByteSize>().is_err());
        assert!("10TB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(ByteSize::gb(1).to_string(), "1GB");
        assert_eq!(ByteSize::mb(1536).to_string(), "1536MB");
        assert_eq!(ByteSize::b(1000).to_string(), "1000B");
        assert_eq!(ByteSize::b(0).to_string(), "0B");
    }

    #[test]
    fn test_budget_toml_round_trip() {
        let budget = CacheBudget::new(AgeUnit::Days.of(7), ByteSize::mb(1000));
        let text = toml::to_string(&budget).unwrap();
        assert!(text.contains("max_age = \"7days\""));

        let parsed: CacheBudget = toml::from_str(&text).unwrap();
        assert_eq!(parsed, budget);
    }
}
