//! Error types for the replication engine.

use thiserror::Error;

/// Result type for replication operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while replicating documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote store answered with a non-success status.
    #[error("remote error (status {status}): {message}")]
    Remote {
        /// HTTP-like status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// The requested document does not exist.
    #[error("document {id} not found in entity {entity}")]
    NotFound {
        /// Data entity that was queried.
        entity: String,
        /// Document id that was looked up.
        id: String,
    },

    /// The remote call exceeded its timeout.
    #[error("operation timed out")]
    Timeout,

    /// The remote store could not be reached at all.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// Every retry attempt failed with a retryable error.
    #[error("exhausted retries after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// A response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request was malformed before it reached the store.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A continuation event could not be handed to the event channel.
    #[error("event dispatch failed: {0}")]
    Dispatch(String),
}

impl SyncError {
    /// Creates a remote error from a status and message.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the HTTP-like status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Remote { status, .. } => Some(*status),
            SyncError::NotFound { .. } => Some(404),
            SyncError::Timeout => Some(408),
            _ => None,
        }
    }

    /// Returns true if this error can be retried.
    ///
    /// Only 408, 429 and 5xx statuses are transient; everything else is
    /// terminal and must surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self.status(), Some(408) | Some(429) | Some(500..))
    }

    /// Returns true if this is a not-found response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Best detail for logs: the remote body when present, else the message.
    pub fn detail(&self) -> String {
        match self {
            SyncError::Remote { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::remote(429, "slow down").is_retryable());
        assert!(SyncError::remote(408, "").is_retryable());
        assert!(SyncError::remote(500, "boom").is_retryable());
        assert!(SyncError::remote(503, "unavailable").is_retryable());
        assert!(SyncError::Timeout.is_retryable());

        assert!(!SyncError::remote(400, "bad").is_retryable());
        assert!(!SyncError::remote(401, "auth").is_retryable());
        assert!(!SyncError::not_found("CL", "x").is_retryable());
        assert!(!SyncError::Unreachable("dns".into()).is_retryable());
        assert!(!SyncError::RetriesExhausted { attempts: 5 }.is_retryable());
    }

    #[test]
    fn not_found_status() {
        let err = SyncError::not_found("CL", "doc-1");
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert!(SyncError::remote(404, "").is_not_found());
        assert!(!SyncError::remote(400, "").is_not_found());
    }

    #[test]
    fn error_display() {
        let err = SyncError::RetriesExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "exhausted retries after 5 attempts");

        let err = SyncError::not_found("CL", "doc-1");
        assert!(err.to_string().contains("doc-1"));
        assert!(err.to_string().contains("CL"));
    }

    #[test]
    fn detail_prefers_remote_body() {
        let err = SyncError::remote(400, r#"{"Message":"invalid field"}"#);
        assert_eq!(err.detail(), r#"{"Message":"invalid field"}"#);
        assert_eq!(SyncError::Timeout.detail(), "operation timed out");
        assert_eq!(
            SyncError::remote(502, "").detail(),
            "remote error (status 502): "
        );
    }
}
