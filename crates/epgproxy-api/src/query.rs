//! `QueryOrchestrator` - guide queries across primary and backup sources.

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use epgproxy_xmltv::{AliasIndex, ProgramEntry, extract_programs, resolve_channel};
use serde::Serialize;
use tracing::instrument;

use crate::cache::{DocumentLookup, EdgeCache, NoEdgeCache, SourceCache};
use crate::fetch::SourceFetcher;

/// Response code of a successful query.
pub const FOUND_CODE: u16 = 200;
/// Response code of a query that found nothing.
pub const NOT_FOUND_CODE: u16 = 404;

/// Date format used in responses and on the command line.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source URLs to query, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    /// Preferred source.
    pub primary: String,
    /// Fallback source tried when the primary yields nothing.
    pub backup: Option<String>,
}

impl SourceSet {
    /// Creates a source set.
    #[must_use]
    pub fn new(primary: impl Into<String>, backup: Option<String>) -> Self {
        Self {
            primary: primary.into(),
            backup,
        }
    }

    /// URLs in order of preference.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.backup.as_deref())
    }
}

/// Programmes of one channel on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideResponse {
    /// Always [`FOUND_CODE`].
    pub code: u16,
    /// XMLTV channel id.
    pub channel_id: String,
    /// Display name that matched the query.
    pub channel_name: String,
    /// Requested date as `YYYY-MM-DD`.
    pub date: String,
    /// Channel icon URL, empty when the source has none.
    pub icon_url: String,
    /// Programmes in document order.
    pub programs: Vec<ProgramEntry>,
    /// Source that answered.
    #[serde(skip)]
    pub source_url: String,
    /// Whether the answer came from stale text.
    #[serde(skip)]
    pub stale: bool,
}

/// Why a source gave no programmes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// No document text could be obtained.
    Unavailable,
    /// The document declares no matching channel.
    ChannelNotFound,
    /// The channel exists but has nothing on that date.
    NoProgramsForDate,
}

/// Per-source diagnostics of a failed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttempt {
    /// Source URL.
    pub url: String,
    /// Why the source gave nothing.
    pub outcome: AttemptOutcome,
    /// Resolved channel id, when the channel was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Latest fetch error of the source, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Diagnostics attached to a not-found response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// Channel name exactly as requested.
    pub requested_channel: String,
    /// Requested date as `YYYY-MM-DD`.
    pub date: String,
    /// Canonical key the name normalized to.
    pub normalized_channel: String,
    /// What each source tried returned.
    pub sources: Vec<SourceAttempt>,
}

/// Result of a query that found nothing on any source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    /// Always [`NOT_FOUND_CODE`].
    pub code: u16,
    /// Diagnostics.
    pub debug_info: DebugInfo,
}

/// Outcome of a guide query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Programmes were found.
    Found(GuideResponse),
    /// No source had programmes for the channel and date.
    NotFound(NotFoundResponse),
}

impl QueryOutcome {
    /// Response code carried in the body.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::Found(found) => found.code,
            Self::NotFound(not_found) => not_found.code,
        }
    }
}

/// A source document as served to a re-export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedDocument {
    /// Source the text came from.
    pub url: String,
    /// Document text.
    pub text: Arc<str>,
    /// Whether the text is stale.
    pub stale: bool,
}

/// Answers guide queries from cached source documents.
pub struct QueryOrchestrator<F, E = NoEdgeCache> {
    /// Shared source cache.
    cache: Arc<SourceCache<F, E>>,
    /// Channel alias index.
    aliases: Arc<AliasIndex>,
}

impl<F, E> std::fmt::Debug for QueryOrchestrator<F, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOrchestrator")
            .field("cache", &self.cache)
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

impl<F, E> QueryOrchestrator<F, E>
where
    F: SourceFetcher + Send + Sync + 'static,
    E: EdgeCache + Send + Sync + 'static,
{
    /// Creates an orchestrator over a shared cache and alias index.
    #[must_use]
    pub const fn new(cache: Arc<SourceCache<F, E>>, aliases: Arc<AliasIndex>) -> Self {
        Self { cache, aliases }
    }

    /// Shared source cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<SourceCache<F, E>> {
        &self.cache
    }

    /// Returns the programmes of `raw_channel` on `date`.
    ///
    /// The primary source is tried first. The backup is only consulted when
    /// the primary yields no programmes, whatever the reason. "Nothing found"
    /// is a [`QueryOutcome::NotFound`], never an error.
    #[instrument(skip_all, fields(channel = %raw_channel, %date))]
    pub async fn query(&self, sources: &SourceSet, raw_channel: &str, date: NaiveDate) -> QueryOutcome {
        let mut attempts = Vec::new();

        for (index, url) in sources.urls().enumerate() {
            if index > 0 {
                tracing::info!(backup = %url, "Primary source had no programmes, trying backup");
            }
            match self.query_source(url, raw_channel, date).await {
                Ok(found) => return QueryOutcome::Found(found),
                Err(attempt) => {
                    tracing::debug!(%url, outcome = ?attempt.outcome, "Source had no programmes");
                    attempts.push(attempt);
                }
            }
        }

        tracing::info!(sources = attempts.len(), "No programmes found");
        QueryOutcome::NotFound(NotFoundResponse {
            code: NOT_FOUND_CODE,
            debug_info: DebugInfo {
                requested_channel: raw_channel.to_owned(),
                date: date.format(DATE_FORMAT).to_string(),
                normalized_channel: self.aliases.normalize(raw_channel),
                sources: attempts,
            },
        })
    }

    /// Resolves and extracts against one source.
    async fn query_source(
        &self,
        url: &str,
        raw_channel: &str,
        date: NaiveDate,
    ) -> Result<GuideResponse, SourceAttempt> {
        let lookup = self.cache.get_document(url).await;
        let attempt = |outcome, channel_id| SourceAttempt {
            url: url.to_owned(),
            outcome,
            channel_id,
            error: lookup.error().map(str::to_owned),
        };

        let Some(text) = lookup.text() else {
            return Err(attempt(AttemptOutcome::Unavailable, None));
        };
        let Some(channel) = resolve_channel(text, raw_channel, &self.aliases) else {
            return Err(attempt(AttemptOutcome::ChannelNotFound, None));
        };
        let programs = extract_programs(text, &channel.id, date);
        if programs.is_empty() {
            return Err(attempt(AttemptOutcome::NoProgramsForDate, Some(channel.id)));
        }

        Ok(GuideResponse {
            code: FOUND_CODE,
            channel_id: channel.id,
            channel_name: channel.display_name,
            date: date.format(DATE_FORMAT).to_string(),
            icon_url: channel.icon_url,
            programs,
            source_url: url.to_owned(),
            stale: lookup.is_stale(),
        })
    }

    /// Returns the first source document that has text, primary first.
    ///
    /// # Errors
    ///
    /// Returns an error listing each source's failure if none has text.
    #[instrument(skip_all)]
    pub async fn document(&self, sources: &SourceSet) -> Result<ServedDocument> {
        let mut failures = Vec::new();

        for url in sources.urls() {
            match self.cache.get_document(url).await {
                DocumentLookup::Fresh(text) => {
                    return Ok(ServedDocument {
                        url: url.to_owned(),
                        text,
                        stale: false,
                    });
                }
                DocumentLookup::Stale { text, error } => {
                    tracing::warn!(%url, %error, "Serving stale source document");
                    return Ok(ServedDocument {
                        url: url.to_owned(),
                        text,
                        stale: true,
                    });
                }
                DocumentLookup::Unavailable { error } => failures.push(format!("{url}: {error}")),
            }
        }

        bail!("no source document available ({})", failures.join("; "))
    }
}
