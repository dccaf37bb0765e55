//! Source cache and query orchestration for epgproxy.
//!
//! Fetches XMLTV documents with bounded network I/O, keeps them behind a
//! coalescing, stale-if-error cache and answers channel/date queries with
//! primary/backup fallback.

/// Cached source documents keyed by URL.
pub mod cache;
/// Cache and fetch limits.
pub mod config;
/// Bounded network fetch of source documents.
pub mod fetch;
/// Guide queries across primary and backup sources.
pub mod query;

pub use cache::{
    DirEdgeCache, DocumentLookup, EdgeCache, LocalEdgeCache, NoEdgeCache, SourceCache, SourceStatus,
};
pub use config::SourceCacheConfig;
pub use fetch::{
    FetchError, FetchLimits, FetchedSource, HttpFetcher, HttpFetcherBuilder, LocalSourceFetcher,
    SourceFetcher, decode_body, encode_gzip, is_compressed,
};
pub use query::{
    AttemptOutcome, DebugInfo, GuideResponse, NotFoundResponse, QueryOrchestrator, QueryOutcome,
    ServedDocument, SourceAttempt, SourceSet,
};
