//! `AppConfig` struct and TOML loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use epgproxy_api::SourceCacheConfig;
use epgproxy_api::config::{
    DEFAULT_ERROR_COOLDOWN, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_SOURCE_BYTES, DEFAULT_MAX_SOURCES,
    DEFAULT_TTL,
};
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Upstream guide sources.
    #[serde(default)]
    pub source: SourceConfig,
    /// Source cache tunables.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Channel alias settings.
    #[serde(default)]
    pub aliases: AliasesConfig,
}

/// Upstream guide sources.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SourceConfig {
    /// Preferred XMLTV source URL.
    pub primary: Option<String>,
    /// Fallback XMLTV source URL.
    pub backup: Option<String>,
}

/// Source cache tunables.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness lifetime of a fetched source, in seconds.
    pub ttl_secs: u64,
    /// Wall-clock budget of one fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Largest accepted source body, in bytes.
    pub max_source_bytes: u64,
    /// Pause after a failed fetch, in seconds.
    pub error_cooldown_secs: u64,
    /// Number of distinct sources kept in memory.
    pub max_sources: usize,
    /// Directory for the on-disk edge cache. Disabled when unset.
    pub edge_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            error_cooldown_secs: DEFAULT_ERROR_COOLDOWN.as_secs(),
            max_sources: DEFAULT_MAX_SOURCES,
            edge_dir: None,
        }
    }
}

impl CacheConfig {
    /// Converts to validated source cache limits.
    ///
    /// # Errors
    ///
    /// Returns an error if any limit is zero.
    pub fn to_source_cache_config(&self) -> Result<SourceCacheConfig> {
        let config = SourceCacheConfig {
            ttl: Duration::from_secs(self.ttl_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_source_bytes: self.max_source_bytes,
            error_cooldown: Duration::from_secs(self.error_cooldown_secs),
            max_sources: self.max_sources,
        };
        config.validate().context("invalid [cache] settings")?;
        Ok(config)
    }
}

/// Channel alias settings.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AliasesConfig {
    /// Extra alias table appended after the built-in one.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert_eq!(config.source.primary, None);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.cache.max_sources, 5);
        assert_eq!(config.aliases.path, None);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        // Arrange
        let config = AppConfig {
            source: SourceConfig {
                primary: Some(String::from("https://example.com/e.xml.gz")),
                backup: Some(String::from("https://mirror.example.com/e.xml")),
            },
            cache: CacheConfig {
                ttl_secs: 600,
                edge_dir: Some(PathBuf::from("/var/cache/epgproxy")),
                ..CacheConfig::default()
            },
            aliases: AliasesConfig {
                path: Some(PathBuf::from("aliases.toml")),
            },
        };

        // Act
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Assert
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let path = Path::new("/tmp/epgproxy_test_nonexistent_config.toml");

        // Act
        let config = AppConfig::load(path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[source]\nprimary = \"https://example.com/e.xml\"\n\n[cache]\nttl_secs = 60\n",
        )
        .unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(
            config.source.primary.as_deref(),
            Some("https://example.com/e.xml")
        );
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.fetch_timeout_secs, 20);
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache\nttl_secs = ").unwrap();

        // Act
        let result = AppConfig::load(&path);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_cache_config_converts_and_validates() {
        // Arrange
        let valid = CacheConfig::default();
        let zero_ttl = CacheConfig {
            ttl_secs: 0,
            ..CacheConfig::default()
        };

        // Act
        let converted = valid.to_source_cache_config().unwrap();
        let rejected = zero_ttl.to_source_cache_config();

        // Assert
        assert_eq!(converted, SourceCacheConfig::default());
        assert!(rejected.is_err());
    }
}
