//! Submission adapter errors

use thiserror::Error;

/// Errors reported by a submission adapter.
///
/// All of these are recoverable from the flow's point of view: the user keeps
/// their answers and may retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmissionError {
    /// 401 - token invalid or expired
    #[error("{adapter}: unauthorized (401)")]
    Unauthorized { adapter: String },

    /// 403 - token lacks required permissions
    #[error("{adapter}: forbidden (403) - insufficient permissions")]
    Forbidden { adapter: String },

    /// 429 - too many requests
    #[error("{adapter}: rate limited{}", .retry_after_secs.map(|s| format!(" - retry after {}s", s)).unwrap_or_default())]
    RateLimited {
        adapter: String,
        retry_after_secs: Option<u64>,
    },

    /// Connection, DNS or timeout failure
    #[error("{adapter}: network error - {message}")]
    Network { adapter: String, message: String },

    /// The backend refused the payload (400/422)
    #[error("{adapter}: rejected - {message}")]
    Rejected { adapter: String, message: String },

    /// Any other non-success status
    #[error("{adapter}: HTTP {status} - {message}")]
    Http {
        adapter: String,
        status: u16,
        message: String,
    },

    /// Local store read/write failure
    #[error("{adapter}: storage error - {message}")]
    Storage { adapter: String, message: String },

    /// Payload could not be encoded or decoded
    #[error("{adapter}: serialization error - {message}")]
    Serialization { adapter: String, message: String },
}

impl SubmissionError {
    pub fn network(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        SubmissionError::Network {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn storage(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        SubmissionError::Storage {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn serialization(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        SubmissionError::Serialization {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(
        adapter: impl Into<String>,
        status: u16,
        message: impl Into<String>,
        retry_after_secs: Option<u64>,
    ) -> Self {
        let adapter = adapter.into();
        let message = message.into();
        match status {
            401 => SubmissionError::Unauthorized { adapter },
            403 => SubmissionError::Forbidden { adapter },
            400 | 422 => SubmissionError::Rejected { adapter, message },
            429 => SubmissionError::RateLimited {
                adapter,
                retry_after_secs,
            },
            _ => SubmissionError::Http {
                adapter,
                status,
                message,
            },
        }
    }

    /// Transient failures worth retrying: network errors, 429 and 5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmissionError::Network { .. } | SubmissionError::RateLimited { .. } => true,
            SubmissionError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            SubmissionError::Unauthorized { .. } | SubmissionError::Forbidden { .. }
        )
    }

    pub fn adapter_name(&self) -> &str {
        match self {
            SubmissionError::Unauthorized { adapter }
            | SubmissionError::Forbidden { adapter }
            | SubmissionError::RateLimited { adapter, .. }
            | SubmissionError::Network { adapter, .. }
            | SubmissionError::Rejected { adapter, .. }
            | SubmissionError::Http { adapter, .. }
            | SubmissionError::Storage { adapter, .. }
            | SubmissionError::Serialization { adapter, .. } => adapter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            SubmissionError::from_status("http", 401, "", None),
            SubmissionError::Unauthorized { .. }
        ));
        assert!(matches!(
            SubmissionError::from_status("http", 403, "", None),
            SubmissionError::Forbidden { .. }
        ));
        assert!(matches!(
            SubmissionError::from_status("http", 422, "bad name", None),
            SubmissionError::Rejected { .. }
        ));
        assert!(matches!(
            SubmissionError::from_status("http", 429, "", Some(30)),
            SubmissionError::RateLimited {
                retry_after_secs: Some(30),
                ..
            }
        ));
        assert!(matches!(
            SubmissionError::from_status("http", 503, "down", None),
            SubmissionError::Http { status: 503, .. }
        ));
    }

    #[test]
    fn test_is_retryable() {
        assert!(SubmissionError::network("http", "timeout").is_retryable());
        assert!(SubmissionError::from_status("http", 429, "", None).is_retryable());
        assert!(SubmissionError::from_status("http", 502, "", None).is_retryable());
        assert!(!SubmissionError::from_status("http", 404, "", None).is_retryable());
        assert!(!SubmissionError::from_status("http", 401, "", None).is_retryable());
        assert!(!SubmissionError::storage("local", "disk full").is_retryable());
    }

    #[test]
    fn test_is_auth_error() {
        assert!(SubmissionError::from_status("http", 401, "", None).is_auth_error());
        assert!(SubmissionError::from_status("http", 403, "", None).is_auth_error());
        assert!(!SubmissionError::network("http", "x").is_auth_error());
    }

    #[test]
    fn test_display() {
        let err = SubmissionError::from_status("http", 429, "", Some(30));
        assert_eq!(err.to_string(), "http: rate limited - retry after 30s");

        let err = SubmissionError::from_status("http", 429, "", None);
        assert_eq!(err.to_string(), "http: rate limited");

        let err = SubmissionError::storage("local", "disk full");
        assert_eq!(err.to_string(), "local: storage error - disk full");
        assert_eq!(err.adapter_name(), "local");
    }
}
