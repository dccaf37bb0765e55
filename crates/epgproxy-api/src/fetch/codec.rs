//! Gzip inflate/deflate of source bodies.

use anyhow::{Context, Result};
use async_compression::tokio::bufread::GzipDecoder;
use async_compression::tokio::write::GzipEncoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::api::FetchedSource;
use super::error::FetchError;

/// Leading bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Turns a fetched body into document text.
///
/// Compressed bodies are inflated with the same byte limit applied to the
/// inflated output. A body flagged compressed but lacking the gzip magic was
/// already inflated in transit and is used as-is. Invalid UTF-8 is replaced
/// rather than rejected.
///
/// # Errors
///
/// Returns [`FetchError::Decode`] for a corrupt gzip stream and
/// [`FetchError::TooLarge`] when the inflated text exceeds `max_bytes`.
pub async fn decode_body(source: FetchedSource, max_bytes: u64) -> Result<String, FetchError> {
    let bytes = if source.compressed && source.body.starts_with(&GZIP_MAGIC) {
        let decoder = GzipDecoder::new(source.body.as_slice());
        let mut inflated = Vec::new();
        decoder
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut inflated)
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        if u64::try_from(inflated.len()).unwrap_or(u64::MAX) > max_bytes {
            return Err(FetchError::TooLarge {
                limit: max_bytes,
                actual: None,
            });
        }
        tracing::debug!(
            compressed_len = source.body.len(),
            inflated_len = inflated.len(),
            "Inflated gzip source"
        );
        inflated
    } else {
        source.body
    };

    Ok(String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

/// Gzip-compresses document text.
///
/// # Errors
///
/// Returns an error if the encoder fails to flush.
pub async fn encode_gzip(text: &str) -> Result<Vec<u8>> {
    let mut encoder = GzipEncoder::new(Vec::new());
    encoder
        .write_all(text.as_bytes())
        .await
        .context("failed to gzip document")?;
    encoder
        .shutdown()
        .await
        .context("failed to finish gzip stream")?;
    Ok(encoder.into_inner())
}
