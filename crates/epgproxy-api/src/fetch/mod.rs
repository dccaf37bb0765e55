//! Bounded network fetch of XMLTV source documents.
//!
//! A fetch is limited by wall-clock time and by body size. Failures are
//! classified into a small taxonomy so the cache can record them and keep
//! serving stale text.

mod api;
mod client;
mod codec;
mod error;

#[allow(clippy::module_name_repetitions)]
pub use api::{FetchLimits, FetchedSource, LocalSourceFetcher, SourceFetcher};
pub use client::{HttpFetcher, HttpFetcherBuilder, is_compressed};
pub use codec::{decode_body, encode_gzip};
#[allow(clippy::module_name_repetitions)]
pub use error::FetchError;
