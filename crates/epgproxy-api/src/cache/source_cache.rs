//! `SourceCache` - coalescing, stale-if-error document cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

use super::edge::{EdgeCache, NoEdgeCache};
use crate::config::SourceCacheConfig;
use crate::fetch::{FetchError, SourceFetcher, decode_body};

/// A fetch in flight, awaited by every caller that asks for its URL.
type PendingFetch = Shared<BoxFuture<'static, DocumentLookup>>;

/// Result of asking the cache for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLookup {
    /// Text fetched within the TTL.
    Fresh(Arc<str>),
    /// Last good text, served because the latest refresh failed.
    Stale {
        /// Previously fetched text.
        text: Arc<str>,
        /// Why the refresh failed.
        error: String,
    },
    /// No text has ever been fetched successfully.
    Unavailable {
        /// Why the latest fetch failed.
        error: String,
    },
}

impl DocumentLookup {
    /// Document text, if any is available.
    #[must_use]
    pub const fn text(&self) -> Option<&Arc<str>> {
        match self {
            Self::Fresh(text) | Self::Stale { text, .. } => Some(text),
            Self::Unavailable { .. } => None,
        }
    }

    /// Error of the latest failed fetch, if the lookup was not fresh.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Fresh(_) => None,
            Self::Stale { error, .. } | Self::Unavailable { error } => Some(error),
        }
    }

    /// Returns `true` for text served after a failed refresh.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

/// Snapshot of one cached source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    /// Source URL.
    pub url: String,
    /// Size of the cached text in bytes.
    pub cached_bytes: Option<usize>,
    /// Time since the last successful fetch.
    pub age: Option<Duration>,
    /// Time left before the cached text goes stale.
    pub expires_in: Option<Duration>,
    /// Whether the cached text is within its TTL.
    pub fresh: bool,
    /// Whether a fetch is in flight.
    pub fetching: bool,
    /// Whether new fetches are paused after a failure.
    pub cooling: bool,
    /// Message of the latest failure.
    pub last_error: Option<String>,
}

/// Cached state of one source URL.
#[derive(Debug, Default)]
struct SourceCacheEntry {
    text: Option<Arc<str>>,
    fetched_at: Option<Instant>,
    expires_at: Option<Instant>,
    last_error_at: Option<Instant>,
    last_error_message: Option<String>,
}

impl SourceCacheEntry {
    /// Text still within its TTL.
    fn fresh_text(&self, now: Instant) -> Option<Arc<str>> {
        match (&self.text, self.expires_at) {
            (Some(text), Some(expires_at)) if now < expires_at => Some(Arc::clone(text)),
            _ => None,
        }
    }

    /// Whether the latest failure is younger than `cooldown`.
    fn is_cooling(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_error_at
            .is_some_and(|at| now.saturating_duration_since(at) < cooldown)
    }

    /// What to serve when no fetch is made: stale text or nothing.
    fn fallback(&self) -> DocumentLookup {
        let error = self.last_error_message.clone().unwrap_or_default();
        match &self.text {
            Some(text) => DocumentLookup::Stale {
                text: Arc::clone(text),
                error,
            },
            None => DocumentLookup::Unavailable { error },
        }
    }
}

/// Mutable cache state behind one lock.
#[derive(Default)]
struct CacheState {
    /// Entries keyed by URL.
    entries: HashMap<String, SourceCacheEntry>,
    /// URLs in insertion order, oldest first.
    order: VecDeque<String>,
    /// Fetches in flight keyed by URL.
    pending: HashMap<String, PendingFetch>,
}

impl CacheState {
    /// Returns the entry for `url`, inserting it and evicting the oldest
    /// entries beyond `max_sources` when it is new.
    fn entry_mut(&mut self, url: &str, max_sources: usize) -> &mut SourceCacheEntry {
        if !self.entries.contains_key(url) {
            self.order.push_back(url.to_owned());
            self.entries
                .insert(url.to_owned(), SourceCacheEntry::default());
            self.evict(max_sources, url);
        }
        self.entries.entry(url.to_owned()).or_default()
    }

    /// Drops the oldest entries until at most `max_sources` remain.
    fn evict(&mut self, max_sources: usize, keep: &str) {
        while self.entries.len() > max_sources {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if oldest == keep {
                self.order.push_back(oldest);
                break;
            }
            self.entries.remove(&oldest);
            tracing::debug!(url = %oldest, "Evicted oldest cached source");
        }
    }
}

/// Coalescing, stale-if-error cache of source documents.
///
/// Holds the fetcher and edge store behind `Arc`s so that fetches run as
/// detached tasks: a caller that stops waiting never cancels a fetch other
/// callers are sharing.
pub struct SourceCache<F, E = NoEdgeCache> {
    /// Network fetcher.
    fetcher: Arc<F>,
    /// Optional shared store consulted before the network.
    edge: Arc<E>,
    /// Limits and lifetimes.
    config: SourceCacheConfig,
    /// Entries and in-flight fetches.
    state: Arc<Mutex<CacheState>>,
}

impl<F, E> std::fmt::Debug for SourceCache<F, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<F> SourceCache<F, NoEdgeCache>
where
    F: SourceFetcher + Send + Sync + 'static,
{
    /// Creates a cache without an edge store.
    #[must_use]
    pub fn new(fetcher: F, config: SourceCacheConfig) -> Self {
        Self::with_edge(fetcher, NoEdgeCache, config)
    }
}

impl<F, E> SourceCache<F, E>
where
    F: SourceFetcher + Send + Sync + 'static,
    E: EdgeCache + Send + Sync + 'static,
{
    /// Creates a cache that consults `edge` before the network.
    #[must_use]
    pub fn with_edge(fetcher: F, edge: E, config: SourceCacheConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            edge: Arc::new(edge),
            config,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Limits and lifetimes in effect.
    #[must_use]
    pub const fn config(&self) -> &SourceCacheConfig {
        &self.config
    }

    /// Returns the document at `url`, fetching it at most once across
    /// concurrent callers.
    ///
    /// Fresh text is served without I/O. During the cooldown after a
    /// failure the last good text (or nothing) is served without a fetch.
    /// Otherwise a fetch is started, or joined if one is already in flight.
    #[instrument(skip_all, fields(%url))]
    pub async fn get_document(&self, url: &str) -> DocumentLookup {
        let pending = {
            let mut state = self.state.lock().await;

            if let Some(pending) = state.pending.get(url) {
                tracing::debug!("Joining in-flight fetch");
                pending.clone()
            } else {
                let now = Instant::now();
                if let Some(entry) = state.entries.get(url) {
                    if let Some(text) = entry.fresh_text(now) {
                        tracing::debug!("Serving fresh cached source");
                        return DocumentLookup::Fresh(text);
                    }
                    if entry.is_cooling(now, self.config.error_cooldown) {
                        tracing::debug!(
                            stale = entry.text.is_some(),
                            "Source cooling down after failure, not fetching"
                        );
                        return entry.fallback();
                    }
                }

                state.entry_mut(url, self.config.max_sources);
                let pending = self.start_fetch(url);
                state.pending.insert(url.to_owned(), pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Spawns the fetch for `url` and returns a shareable handle to its
    /// outcome. The task settles the cache entry itself.
    fn start_fetch(&self, url: &str) -> PendingFetch {
        let fetcher = Arc::clone(&self.fetcher);
        let edge = Arc::clone(&self.edge);
        let state = Arc::clone(&self.state);
        let config = self.config.clone();
        let task_url = url.to_owned();

        tracing::info!(%url, "Fetching source");
        let handle = tokio::spawn(async move {
            let result = load_source(&*fetcher, &*edge, &task_url, &config).await;
            settle(&state, &task_url, result, &config).await
        });

        let state = Arc::clone(&self.state);
        let key = url.to_owned();
        async move {
            match handle.await {
                Ok(lookup) => lookup,
                Err(e) => {
                    tracing::error!(url = %key, error = %e, "Fetch task failed");
                    state.lock().await.pending.remove(&key);
                    DocumentLookup::Unavailable {
                        error: format!("fetch task failed: {e}"),
                    }
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Snapshot of every cached source in insertion order.
    pub async fn status(&self) -> Vec<SourceStatus> {
        let state = self.state.lock().await;
        let now = Instant::now();

        state
            .order
            .iter()
            .filter_map(|url| {
                let entry = state.entries.get(url)?;
                Some(SourceStatus {
                    url: url.clone(),
                    cached_bytes: entry.text.as_ref().map(|text| text.len()),
                    age: entry
                        .fetched_at
                        .map(|at| now.saturating_duration_since(at)),
                    expires_in: entry
                        .expires_at
                        .map(|at| at.saturating_duration_since(now)),
                    fresh: entry.fresh_text(now).is_some(),
                    fetching: state.pending.contains_key(url),
                    cooling: entry.is_cooling(now, self.config.error_cooldown),
                    last_error: entry.last_error_message.clone(),
                })
            })
            .collect()
    }
}

/// Reads the edge store, falling back to a bounded network fetch.
///
/// Edge store failures are logged and never fail the load.
async fn load_source<F, E>(
    fetcher: &F,
    edge: &E,
    url: &str,
    config: &SourceCacheConfig,
) -> Result<Arc<str>, FetchError>
where
    F: SourceFetcher + Sync,
    E: EdgeCache + Sync,
{
    match edge.get(url).await {
        Ok(Some(body)) => {
            tracing::debug!(%url, bytes = body.len(), "Edge cache hit");
            return Ok(Arc::from(String::from_utf8_lossy(&body).as_ref()));
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(%url, error = %e, "Edge cache read failed, fetching directly"),
    }

    let limits = config.limits();
    let fetched = tokio::time::timeout(limits.timeout, fetcher.fetch(url, limits))
        .await
        .unwrap_or(Err(FetchError::Timeout(limits.timeout)))?;
    let text = decode_body(fetched, limits.max_bytes).await?;

    if let Err(e) = edge.put(url, text.as_bytes(), config.ttl).await {
        tracing::warn!(%url, error = %e, "Edge cache write failed");
    }
    Ok(Arc::from(text))
}

/// Records the fetch outcome and releases the in-flight registration.
#[allow(clippy::arithmetic_side_effects)]
async fn settle(
    state: &Mutex<CacheState>,
    url: &str,
    result: Result<Arc<str>, FetchError>,
    config: &SourceCacheConfig,
) -> DocumentLookup {
    let mut state = state.lock().await;
    state.pending.remove(url);

    let now = Instant::now();
    let entry = state.entry_mut(url, config.max_sources);
    match result {
        Ok(text) => {
            tracing::info!(%url, bytes = text.len(), "Source fetched");
            entry.text = Some(Arc::clone(&text));
            entry.fetched_at = Some(now);
            entry.expires_at = Some(now + config.ttl);
            entry.last_error_at = None;
            entry.last_error_message = None;
            DocumentLookup::Fresh(text)
        }
        Err(error) => {
            tracing::warn!(
                %url,
                kind = error.kind(),
                error = %error,
                stale_available = entry.text.is_some(),
                "Source fetch failed"
            );
            entry.last_error_at = Some(now);
            entry.last_error_message = Some(error.to_string());
            entry.fallback()
        }
    }
}
