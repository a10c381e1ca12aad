//! Error types for the REST transport and reconciler.

use std::time::Duration;

use thiserror::Error;

use crate::schema::{Diagnostic, DiagnosticSeverity};

/// Errors returned by [`Transport`](crate::Transport) and
/// [`Reconciler`](crate::Reconciler) operations.
///
/// Every exchange either yields a typed value or one of these variants; the
/// core never logs-and-continues.
#[derive(Debug, Error)]
pub enum RestError {
    /// The request body could not be serialized. Always a caller bug.
    #[error("Failed to encode request body: {0}")]
    Marshal(#[source] serde_json::Error),

    /// Connection-level failure (DNS, connect, TLS, broken stream).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The exchange did not complete within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the exchange while it was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// The remote API answered with a status >= 400. The body is kept verbatim.
    #[error("HTTP {status}: {body}")]
    RemoteApi {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Failed to decode response body: {source}; body: {body}")]
    Decode {
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
        /// Raw response body.
        body: String,
    },

    /// The remote entity does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Entity kind name.
        kind: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// An operation that needs a bound record was attempted on an absent one.
    #[error("{kind} is not bound to a remote entity")]
    NotBound {
        /// Entity kind name.
        kind: String,
    },

    /// The remote response did not carry the entity identifier.
    #[error("Response for {kind} carries no identifier")]
    MissingIdentity {
        /// Entity kind name.
        kind: String,
    },

    /// The remote response carried a different identifier than the bound one.
    #[error("{kind} identifier changed from '{expected}' to '{actual}'")]
    IdentityMismatch {
        /// Entity kind name.
        kind: String,
        /// Identifier the record is bound to.
        expected: String,
        /// Identifier found in the response.
        actual: String,
    },

    /// The desired record failed validation against its descriptor.
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<Diagnostic>),

    /// Pagination did not finish within the page cap.
    #[error("Pagination exceeded {limit} pages")]
    PageLimitExceeded {
        /// Maximum number of pages that was allowed.
        limit: usize,
    },

    /// A pagination `next` link could not be followed.
    #[error("Invalid next link: {0}")]
    InvalidNextLink(String),

    /// The endpoint configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RestError {
    /// HTTP status of a remote rejection, if this error is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body attached to this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::RemoteApi { body, .. } | Self::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether this error reports absence rather than failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a caller-side retry of the same operation can succeed.
    ///
    /// Transport failures, timeouts, 5xx and 429 responses qualify. Updates
    /// must recompute their diff before retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::RemoteApi { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .map(|d| match &d.attribute {
            Some(attr) => format!("{} ({})", d.summary, attr),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_keeps_body() {
        let err = RestError::RemoteApi {
            status: 400,
            body: "invalid request".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("invalid request"));
        assert_eq!(err.body(), Some("invalid request"));
    }

    #[test]
    fn test_error_display() {
        let err = RestError::NotFound {
            kind: "user".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(format!("{}", err), "user '42' not found");

        let err = RestError::NotBound {
            kind: "user".to_string(),
        };
        assert_eq!(format!("{}", err), "user is not bound to a remote entity");

        let err = RestError::Timeout(Duration::from_secs(5));
        assert_eq!(format!("{}", err), "Request timed out after 5s");
    }

    #[test]
    fn test_retryable_classification() {
        let status = |status| RestError::RemoteApi {
            status,
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(422).is_retryable());
        assert!(RestError::Transport("connection refused".into()).is_retryable());
        assert!(RestError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!RestError::Cancelled.is_retryable());

        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(!RestError::Marshal(decode).is_retryable());
    }

    #[test]
    fn test_validation_summary_lists_errors_only() {
        let err = RestError::Validation(vec![
            Diagnostic::error("Missing required attribute 'name'").with_attribute("name"),
            Diagnostic::warning("Attribute 'id' is read-only"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: Missing required attribute 'name' (name)"
        );
    }

    #[test]
    fn test_status_accessor() {
        let err = RestError::RemoteApi {
            status: 409,
            body: "conflict".into(),
        };
        assert_eq!(err.status(), Some(409));
        assert_eq!(RestError::Cancelled.status(), None);
        assert!(!err.is_not_found());
    }
}
