//! Optional shared store consulted before the network.
#![allow(clippy::future_not_send)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};

/// Shared document store keyed by source URL.
///
/// Failures are reported to the caller, which logs them and carries on
/// without the store.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(EdgeCache: Send)]
pub trait LocalEdgeCache {
    /// Returns the stored document text for `url`, or `None` on a miss or
    /// an expired entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>>;

    /// Stores document text for `url` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn put(&self, url: &str, body: &[u8], ttl: Duration) -> Result<()>;
}

/// Edge store that never hits.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct NoEdgeCache;

impl EdgeCache for NoEdgeCache {
    async fn get(&self, _url: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn put(&self, _url: &str, _body: &[u8], _ttl: Duration) -> Result<()> {
        Ok(())
    }
}

/// An optional store: `None` behaves like [`NoEdgeCache`].
impl<E> EdgeCache for Option<E>
where
    E: EdgeCache + Sync,
{
    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Some(edge) => edge.get(url).await,
            None => Ok(None),
        }
    }

    async fn put(&self, url: &str, body: &[u8], ttl: Duration) -> Result<()> {
        match self {
            Some(edge) => edge.put(url, body, ttl).await,
            None => Ok(()),
        }
    }
}

/// Edge store backed by a directory.
///
/// Each URL maps to `<sha256>.xml` plus a `<sha256>.expires` file holding
/// the expiry as Unix seconds.
#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct DirEdgeCache {
    /// Directory holding cached documents.
    dir: PathBuf,
}

impl DirEdgeCache {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem derived from the URL.
    fn stem(url: &str) -> String {
        format!("{:x}", Sha256::digest(url.as_bytes()))
    }

    fn body_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.xml"))
    }

    fn expires_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.expires"))
    }
}

impl EdgeCache for DirEdgeCache {
    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let stem = Self::stem(url);
        let expires_path = self.expires_path(&stem);

        let expires = match tokio::fs::read_to_string(&expires_path).await {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("corrupt expiry in {}", expires_path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", expires_path.display()));
            }
        };
        if Utc::now().timestamp() >= expires {
            tracing::debug!(%url, "Edge entry expired");
            return Ok(None);
        }

        let body_path = self.body_path(&stem);
        match tokio::fs::read(&body_path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", body_path.display())),
        }
    }

    async fn put(&self, url: &str, body: &[u8], ttl: Duration) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let stem = Self::stem(url);
        let body_path = self.body_path(&stem);
        let staging = self.dir.join(format!("{stem}.xml.tmp"));
        tokio::fs::write(&staging, body)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        tokio::fs::rename(&staging, &body_path)
            .await
            .with_context(|| format!("failed to move {}", body_path.display()))?;

        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        let expires_path = self.expires_path(&stem);
        tokio::fs::write(&expires_path, expires.to_string())
            .await
            .with_context(|| format!("failed to write {}", expires_path.display()))?;

        tracing::debug!(%url, bytes = body.len(), expires, "Edge entry stored");
        Ok(())
    }
}
