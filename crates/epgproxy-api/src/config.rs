//! Cache and fetch limits.

use std::time::Duration;

use anyhow::{Result, ensure};

use super::fetch::FetchLimits;

/// Default freshness lifetime of a fetched source.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Default wall-clock budget of one fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Default largest accepted source body (150 MiB).
pub const DEFAULT_MAX_SOURCE_BYTES: u64 = 150 * 1024 * 1024;
/// Default pause after a failed fetch before the next attempt.
pub const DEFAULT_ERROR_COOLDOWN: Duration = Duration::from_secs(120);
/// Default number of distinct source URLs kept in memory.
pub const DEFAULT_MAX_SOURCES: usize = 5;

/// Tunables of the source cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct SourceCacheConfig {
    /// How long a fetched document stays fresh.
    pub ttl: Duration,
    /// Wall-clock budget of one fetch, body included.
    pub fetch_timeout: Duration,
    /// Largest accepted source body, compressed or inflated.
    pub max_source_bytes: u64,
    /// Pause after a failure during which no new fetch is started.
    pub error_cooldown: Duration,
    /// Number of distinct source URLs kept; the oldest is evicted first.
    pub max_sources: usize,
}

impl Default for SourceCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            error_cooldown: DEFAULT_ERROR_COOLDOWN,
            max_sources: DEFAULT_MAX_SOURCES,
        }
    }
}

impl SourceCacheConfig {
    /// Checks that every limit is usable.
    ///
    /// A zero cooldown is allowed and disables cooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL, fetch timeout, size limit or source
    /// count is zero.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.ttl.is_zero(), "cache ttl must be positive");
        ensure!(!self.fetch_timeout.is_zero(), "fetch timeout must be positive");
        ensure!(self.max_source_bytes > 0, "max source bytes must be positive");
        ensure!(self.max_sources > 0, "max sources must be positive");
        Ok(())
    }

    /// Fetch limits derived from this configuration.
    #[must_use]
    pub const fn limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: self.fetch_timeout,
            max_bytes: self.max_source_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        // Arrange & Act & Assert
        assert!(SourceCacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_values_are_rejected() {
        // Arrange
        let cases = [
            SourceCacheConfig {
                ttl: Duration::ZERO,
                ..SourceCacheConfig::default()
            },
            SourceCacheConfig {
                fetch_timeout: Duration::ZERO,
                ..SourceCacheConfig::default()
            },
            SourceCacheConfig {
                max_source_bytes: 0,
                ..SourceCacheConfig::default()
            },
            SourceCacheConfig {
                max_sources: 0,
                ..SourceCacheConfig::default()
            },
        ];

        // Act & Assert
        for config in cases {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_zero_cooldown_is_allowed() {
        // Arrange
        let config = SourceCacheConfig {
            error_cooldown: Duration::ZERO,
            ..SourceCacheConfig::default()
        };

        // Act & Assert
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limits_follow_config() {
        // Arrange
        let config = SourceCacheConfig::default();

        // Act
        let limits = config.limits();

        // Assert
        assert_eq!(limits.timeout, Duration::from_secs(20));
        assert_eq!(limits.max_bytes, 150 * 1024 * 1024);
    }
}
