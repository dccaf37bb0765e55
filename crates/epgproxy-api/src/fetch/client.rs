//! `HttpFetcher` - bounded HTTP fetch of source documents.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use tracing::instrument;
use url::Url;

use super::api::{FetchLimits, FetchedSource, SourceFetcher};
use super::error::FetchError;

/// Default TCP connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP source fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// HTTP client (reqwest, gzip enabled).
    http_client: Client,
}

/// Builder for `HttpFetcher`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct HttpFetcherBuilder {
    user_agent: Option<String>,
    connect_timeout: Option<Duration>,
}

impl HttpFetcherBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            user_agent: None,
            connect_timeout: None,
        }
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the TCP connect timeout (default: 10s).
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the fetcher.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<HttpFetcher> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .build()
            .context("failed to build HTTP client")?;

        Ok(HttpFetcher { http_client })
    }
}

impl HttpFetcher {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> HttpFetcherBuilder {
        HttpFetcherBuilder::new()
    }

    /// Sends the request and reads the body, enforcing the size limit.
    async fn fetch_bounded(&self, url: &str, limits: FetchLimits) -> Result<FetchedSource, FetchError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(&e, limits.timeout))?;

        let status = response.status();
        tracing::trace!(%status, headers = ?response.headers(), "Response headers");
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        if let Some(declared) = response.content_length()
            && declared > limits.max_bytes
        {
            return Err(FetchError::TooLarge {
                limit: limits.max_bytes,
                actual: Some(declared),
            });
        }

        let compressed = is_compressed(response.headers(), url);
        let mut body = Vec::new();
        let mut received: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify(&e, limits.timeout))?
        {
            received = received.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));
            if received > limits.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: limits.max_bytes,
                    actual: None,
                });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(body_len = body.len(), compressed, "Response body received");
        Ok(FetchedSource { body, compressed })
    }
}

impl SourceFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str, limits: FetchLimits) -> Result<FetchedSource, FetchError> {
        tokio::time::timeout(limits.timeout, self.fetch_bounded(url, limits))
            .await
            .unwrap_or(Err(FetchError::Timeout(limits.timeout)))
    }
}

/// Maps a transport error onto the fetch taxonomy.
fn classify(error: &reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(error.to_string())
    }
}

/// Returns `true` if the body is a gzip stream by content type or by a
/// `.gz` path.
#[must_use]
pub fn is_compressed(headers: &HeaderMap, url: &str) -> bool {
    let gzip_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("gzip"));

    let gz_path = Url::parse(url).map_or_else(
        |_| url.to_ascii_lowercase().ends_with(".gz"),
        |parsed| parsed.path().to_ascii_lowercase().ends_with(".gz"),
    );

    gzip_type || gz_path
}
