//! Per-URL cache of source documents.
//!
//! Concurrent requests for the same URL share one fetch. A failed refresh
//! keeps serving the last good text and pauses further attempts for a
//! cooldown. An optional edge store is consulted before the network.

mod edge;
mod source_cache;

pub use edge::{DirEdgeCache, EdgeCache, LocalEdgeCache, NoEdgeCache};
#[allow(clippy::module_name_repetitions)]
pub use source_cache::{DocumentLookup, SourceCache, SourceStatus};
