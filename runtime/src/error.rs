//! Typed errors for transport, discovery and audit.
//!
//! Every failure is scoped to a single operation: one HTTP call, one
//! discovery run, or one audit run. Nothing here is fatal to the process.

use thiserror::Error;

/// Failure of a single logical HTTP call, surfaced after retries are exhausted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The per-call deadline elapsed (retries included).
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Connection refused/reset, DNS failure, body read failure.
    #[error("network error reaching {url}: {message}")]
    Network { url: String, message: String },

    /// The caller cancelled the call.
    #[error("request to {url} was cancelled")]
    Aborted { url: String },
}

impl TransportError {
    /// HTTP status code, when the failure was a status response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, network failures, 429 and 5xx are retryable. Other 4xx and
    /// cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } | TransportError::Network { .. } => true,
            TransportError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            TransportError::Aborted { .. } => false,
        }
    }

    /// Endpoint the failed call was addressed to.
    pub fn url(&self) -> &str {
        match self {
            TransportError::Timeout { url }
            | TransportError::HttpStatus { url, .. }
            | TransportError::Network { url, .. }
            | TransportError::Aborted { url } => url,
        }
    }
}

/// Failure of a discovery call (sitemap, CMS listing, manual entry).
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No sitemap or API endpoint is reachable at the target.
    #[error("nothing found at {target}")]
    NotFound { target: String },

    /// The CMS rejected the supplied credentials.
    #[error("unauthorized at {endpoint}")]
    Unauthorized { endpoint: String },

    /// The source parsed but yielded zero pages.
    #[error("{target} contained no pages")]
    EmptyResult { target: String },

    /// Caller input could not be used.
    #[error("invalid input {input:?}: {reason}")]
    InvalidInput { input: String, reason: String },

    /// A newer discovery superseded this one.
    #[error("discovery cancelled")]
    Cancelled,

    /// Transport failure that maps to none of the kinds above.
    #[error(transparent)]
    Transport(TransportError),

    /// The source answered with a body we could not decode.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl DiscoveryError {
    /// Short actionable advice for the person running the discovery.
    pub fn hint(&self) -> &'static str {
        match self {
            DiscoveryError::NotFound { .. } => "try the alternate source",
            DiscoveryError::Unauthorized { .. } => "check credentials",
            DiscoveryError::EmptyResult { .. } => "try the alternate source or add URLs manually",
            DiscoveryError::InvalidInput { .. } => "enter an absolute http(s) URL",
            DiscoveryError::Cancelled => "a newer discovery is running",
            DiscoveryError::Transport(_) => "retry later",
            DiscoveryError::Malformed { .. } => "verify the endpoint URL",
        }
    }

    pub(crate) fn invalid(input: &str, reason: impl Into<String>) -> Self {
        DiscoveryError::InvalidInput {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<TransportError> for DiscoveryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::HttpStatus { url, status: 401 } => {
                DiscoveryError::Unauthorized { endpoint: url }
            }
            TransportError::HttpStatus { url, status: 404 } => {
                DiscoveryError::NotFound { target: url }
            }
            TransportError::Aborted { .. } => DiscoveryError::Cancelled,
            other => DiscoveryError::Transport(other),
        }
    }
}

/// Failure of an audit run as a whole.
///
/// Individual page failures never produce this; they are skipped.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Required configuration is absent or unusable.
    #[error("audit configuration missing: {0}")]
    ConfigMissing(String),

    /// The analyzer could not be constructed.
    #[error("content analyzer unavailable: {0}")]
    AnalyzerUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let status = |s| TransportError::HttpStatus {
            url: "https://example.com".into(),
            status: s,
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!TransportError::Aborted { url: "u".into() }.is_retryable());
        assert!(TransportError::Timeout { url: "u".into() }.is_retryable());
    }

    #[test]
    fn test_transport_to_discovery_mapping() {
        let unauthorized: DiscoveryError = TransportError::HttpStatus {
            url: "https://cms/users/me".into(),
            status: 401,
        }
        .into();
        assert!(matches!(unauthorized, DiscoveryError::Unauthorized { .. }));
        assert_eq!(unauthorized.hint(), "check credentials");

        let missing: DiscoveryError = TransportError::HttpStatus {
            url: "https://cms/posts".into(),
            status: 404,
        }
        .into();
        assert!(matches!(missing, DiscoveryError::NotFound { .. }));
        assert_eq!(missing.hint(), "try the alternate source");

        let aborted: DiscoveryError = TransportError::Aborted { url: "u".into() }.into();
        assert!(matches!(aborted, DiscoveryError::Cancelled));

        let server: DiscoveryError = TransportError::HttpStatus {
            url: "u".into(),
            status: 502,
        }
        .into();
        assert!(matches!(server, DiscoveryError::Transport(_)));
    }
}
