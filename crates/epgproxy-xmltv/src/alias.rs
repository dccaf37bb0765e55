//! Channel alias table and name normalization.
//!
//! The table is plain data: a list of canonical keys, each with the raw
//! spellings that should resolve to it. [`AliasIndex`] flattens it once into
//! a lookup map and is read-only afterwards.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Built-in alias data shipped with the crate.
const BUILTIN_ALIASES: &str = include_str!("../data/aliases.toml");

/// Quality and resolution suffixes stripped when a direct lookup misses.
///
/// Longer suffixes come first so that `超高清` is not cut down to `超`.
const NOISE_SUFFIXES: &[&str] = &[
    "超高清", "高清", "超清", "标清", "FHD", "UHD", "HD", "SD", "4K", "8K",
];

/// One canonical channel and its accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AliasEntry {
    /// Canonical channel key.
    pub key: String,
    /// Raw spellings that resolve to `key`.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Ordered alias table as loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct AliasTable {
    /// Entries in table order. Order decides which key wins a collision.
    #[serde(rename = "channel", default)]
    pub entries: Vec<AliasEntry>,
}

impl AliasTable {
    /// Parses an alias table from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid alias table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse alias table")
    }

    /// Loads an alias table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid alias file {}", path.display()))
    }

    /// Returns the table embedded in the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data fails to parse.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_ALIASES).context("built-in alias table is invalid")
    }

    /// Appends the entries of `other` after this table's entries.
    ///
    /// Appended spellings win over existing ones when they collide.
    pub fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

/// Flattened spelling-to-key lookup built from an [`AliasTable`].
#[derive(Debug, Clone, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct AliasIndex {
    /// Cleaned spelling -> canonical key.
    lookup: HashMap<String, String>,
}

impl AliasIndex {
    /// Builds the index. Later entries overwrite earlier ones on collision,
    /// and each collision is logged.
    #[must_use]
    pub fn new(table: &AliasTable) -> Self {
        let mut lookup: HashMap<String, String> = HashMap::new();

        for entry in &table.entries {
            let spellings = std::iter::once(&entry.key).chain(entry.aliases.iter());
            for spelling in spellings {
                let cleaned = clean(spelling);
                if cleaned.is_empty() {
                    continue;
                }
                if let Some(previous) = lookup.insert(cleaned.clone(), entry.key.clone())
                    && previous != entry.key
                {
                    tracing::warn!(
                        spelling = %cleaned,
                        previous = %previous,
                        winner = %entry.key,
                        "Alias spelling claimed by two channels, later entry wins"
                    );
                }
            }
        }

        Self { lookup }
    }

    /// Builds the index from the built-in table.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded data fails to parse.
    pub fn builtin() -> Result<Self> {
        AliasTable::builtin().map(|table| Self::new(&table))
    }

    /// Number of distinct spellings in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns `true` if the index holds no spellings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Maps a raw channel name to its canonical key.
    ///
    /// Unknown names come back cleaned but otherwise unchanged; deciding
    /// whether that key exists is left to the resolver.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned = clean(raw);

        if let Some(key) = self.lookup.get(&cleaned) {
            return key.clone();
        }

        let mut candidate = cleaned.as_str();
        while let Some(stripped) = strip_noise_suffix(candidate) {
            if let Some(key) = self.lookup.get(stripped) {
                return key.clone();
            }
            candidate = stripped;
        }

        cleaned
    }
}

/// Upper-cases ASCII letters and drops whitespace, `-`, `_` and em-dash.
///
/// Non-ASCII characters and `+` pass through untouched.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '—'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Removes one trailing noise suffix, if the remainder is non-empty.
fn strip_noise_suffix(name: &str) -> Option<&str> {
    NOISE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|rest| !rest.is_empty())
}
