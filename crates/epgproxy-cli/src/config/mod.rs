//! Application configuration module.
//!
//! Manages the TOML config file holding source URLs, cache limits and
//! the optional user alias file.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AliasesConfig, AppConfig, CacheConfig, SourceConfig};
pub use paths::resolve_config_path;
