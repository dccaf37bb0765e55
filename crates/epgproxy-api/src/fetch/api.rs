//! `SourceFetcher` trait definition.
#![allow(clippy::future_not_send)]

use std::time::Duration;

use super::error::FetchError;

/// Time and size bounds applied to one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Wall-clock budget for the whole request, body included.
    pub timeout: Duration,
    /// Largest accepted body, compressed or not.
    pub max_bytes: u64,
}

/// Raw body of a fetched source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    /// Body bytes as received.
    pub body: Vec<u8>,
    /// Whether the body is a gzip stream that still needs inflating.
    pub compressed: bool,
}

/// Source fetch trait.
///
/// Abstracts network access for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(SourceFetcher: Send)]
pub trait LocalSourceFetcher {
    /// Fetches the document at `url` within `limits`.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why no body was obtained.
    async fn fetch(&self, url: &str, limits: FetchLimits) -> Result<FetchedSource, FetchError>;
}
