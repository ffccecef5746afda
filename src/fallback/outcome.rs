//! Terminal outcomes and failure classification

use chrono::{DateTime, SecondsFormat, Utc};
use hyper::body::Bytes;
use hyper::StatusCode;
use thiserror::Error;

use super::adapter::{TransportError, UpstreamResponse};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("URL parameter is required")]
    MissingParameter,
    /// Local failure before any attempt was made
    #[error("{0}")]
    InvalidTarget(String),
    #[error("{0}")]
    Transport(TransportError),
    #[error("Request failed with status code {}", .status.as_u16())]
    UpstreamHttp { status: StatusCode, body: Bytes },
    #[error("All approaches failed")]
    AllApproachesExhausted,
}

impl ProxyError {
    /// Status code surfaced to the client
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter => StatusCode::BAD_REQUEST,
            Self::InvalidTarget(_) | Self::AllApproachesExhausted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Transport(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamHttp { status, .. } => *status,
        }
    }

    /// Human readable message surfaced to the client
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingParameter => "URL parameter is required".to_string(),
            Self::InvalidTarget(message) => message.clone(),
            Self::Transport(_) => {
                "No response from upstream (timeout or network error)".to_string()
            }
            Self::UpstreamHttp { status, .. } => match *status {
                StatusCode::FORBIDDEN => "Access denied by upstream (403 Forbidden)".to_string(),
                StatusCode::TOO_MANY_REQUESTS => {
                    "Rate limited by upstream (429 Too Many Requests)".to_string()
                }
                StatusCode::NOT_FOUND => "Upstream endpoint not found (404 Not Found)".to_string(),
                other => format!("Upstream API error: {}", other.as_u16()),
            },
            Self::AllApproachesExhausted => "All approaches failed".to_string(),
        }
    }
}

/// A classified failure, frozen at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub error: ProxyError,
    pub status: StatusCode,
    pub message: String,
    /// Underlying diagnostic, for logs and the `details` field only
    pub details: String,
    pub timestamp: DateTime<Utc>,
    /// Number of upstream attempts made
    pub attempts: usize,
}

impl FailureReport {
    pub fn new(error: ProxyError, attempts: usize) -> Self {
        Self {
            status: error.status_code(),
            message: error.public_message(),
            details: error.to_string(),
            error,
            timestamp: Utc::now(),
            attempts,
        }
    }

    /// RFC 3339 with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Equality ignoring the generation timestamp
    #[cfg(test)]
    pub fn same_failure(&self, other: &Self) -> bool {
        self.error == other.error
            && self.status == other.status
            && self.message == other.message
            && self.details == other.details
            && self.attempts == other.attempts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    Success {
        /// Name of the profile that got through
        profile: String,
        response: UpstreamResponse,
    },
    Failure(FailureReport),
}

impl FallbackOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success { .. } => StatusCode::OK,
            Self::Failure(report) => report.status,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Equality ignoring failure timestamps
    #[cfg(test)]
    pub fn same_outcome(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Failure(a), Self::Failure(b)) => a.same_failure(b),
            (a, b) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(code: u16) -> ProxyError {
        ProxyError::UpstreamHttp {
            status: StatusCode::from_u16(code).unwrap(),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_upstream_status_messages() {
        let cases = [
            (403, "Access denied by upstream (403 Forbidden)"),
            (429, "Rate limited by upstream (429 Too Many Requests)"),
            (404, "Upstream endpoint not found (404 Not Found)"),
            (418, "Upstream API error: 418"),
            (502, "Upstream API error: 502"),
        ];
        for (code, message) in cases {
            let err = http(code);
            assert_eq!(err.status_code().as_u16(), code);
            assert_eq!(err.public_message(), message);
        }
    }

    #[test]
    fn test_transport_maps_to_gateway_timeout() {
        let err = ProxyError::Transport(TransportError::Timeout("operation timed out".into()));
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            err.public_message(),
            "No response from upstream (timeout or network error)"
        );
        assert_eq!(err.to_string(), "timeout: operation timed out");
    }

    #[test]
    fn test_local_errors() {
        let missing = ProxyError::MissingParameter;
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(missing.public_message(), "URL parameter is required");

        let invalid = ProxyError::InvalidTarget("relative URL without a base".into());
        assert_eq!(invalid.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(invalid.public_message(), "relative URL without a base");

        let exhausted = ProxyError::AllApproachesExhausted;
        assert_eq!(exhausted.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(exhausted.public_message(), "All approaches failed");
    }

    #[test]
    fn test_report_details_and_timestamp() {
        let report = FailureReport::new(http(403), 3);
        assert_eq!(report.status, StatusCode::FORBIDDEN);
        assert_eq!(report.details, "Request failed with status code 403");
        assert_eq!(report.attempts, 3);
        let ts = report.timestamp_string();
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_same_failure_ignores_timestamp() {
        let a = FailureReport::new(http(429), 2);
        let mut b = a.clone();
        b.timestamp = a.timestamp + chrono::TimeDelta::seconds(5);
        assert_ne!(a, b);
        assert!(a.same_failure(&b));
        assert!(FallbackOutcome::Failure(a).same_outcome(&FallbackOutcome::Failure(b)));
    }
}
