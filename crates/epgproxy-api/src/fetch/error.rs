//! Failure taxonomy for a source fetch.

use std::time::Duration;

/// Why a source could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum FetchError {
    /// No complete body arrived within the fetch timeout.
    Timeout(Duration),
    /// The body exceeded the size limit, either by declared length or while
    /// streaming. `actual` is the declared length when known.
    TooLarge {
        /// Configured limit in bytes.
        limit: u64,
        /// Declared `Content-Length`, if any.
        actual: Option<u64>,
    },
    /// Upstream answered with a non-success HTTP status.
    Http(u16),
    /// Connection, DNS or transport failure.
    Network(String),
    /// The body could not be decompressed.
    Decode(String),
}

impl FetchError {
    /// Short machine-readable name of the failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::TooLarge { .. } => "too_large",
            Self::Http(_) => "http",
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(after) => write!(f, "fetch timed out after {after:?}"),
            Self::TooLarge {
                limit,
                actual: Some(actual),
            } => write!(f, "source is {actual} bytes, limit is {limit} bytes"),
            Self::TooLarge {
                limit,
                actual: None,
            } => write!(f, "source exceeds limit of {limit} bytes"),
            Self::Http(status) => write!(f, "upstream returned HTTP {status}"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Decode(message) => write!(f, "failed to decode source: {message}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        // Arrange & Act & Assert
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(20)).to_string(),
            "fetch timed out after 20s"
        );
        assert_eq!(
            FetchError::TooLarge {
                limit: 10,
                actual: Some(20)
            }
            .to_string(),
            "source is 20 bytes, limit is 10 bytes"
        );
        assert_eq!(
            FetchError::TooLarge {
                limit: 10,
                actual: None
            }
            .to_string(),
            "source exceeds limit of 10 bytes"
        );
        assert_eq!(FetchError::Http(503).to_string(), "upstream returned HTTP 503");
    }

    #[test]
    fn test_kind() {
        // Arrange & Act & Assert
        assert_eq!(FetchError::Timeout(Duration::ZERO).kind(), "timeout");
        assert_eq!(FetchError::Http(404).kind(), "http");
        assert_eq!(FetchError::Network(String::new()).kind(), "network");
        assert_eq!(FetchError::Decode(String::new()).kind(), "decode");
    }
}
