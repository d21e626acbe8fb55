//! Error types for the answerdesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] composes them.
//!
//! Propagation policy: [`ModelError`]s are absorbed by the answer selector,
//! so only [`Error::InvalidQuery`] and [`Error::ServiceUnavailable`] ever
//! reach the caller of `answer()`. [`Error::Index`] carries admin-side
//! index failures.

use thiserror::Error;

/// The top-level error type for all answerdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or whitespace-only input, rejected before any search.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Nothing was retrieved and the language model could not answer either.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // --- Knowledge index errors ---
    #[error("Knowledge index error: {0}")]
    Index(#[source] IndexError),
}

impl Error {
    /// A stable, machine-readable name for the error, used in API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidQuery(_) => "invalid_query",
            Error::ServiceUnavailable(_) => "service_unavailable",
            Error::Index(e) => e.kind(),
        }
    }
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::InvalidQuery(reason) => Error::InvalidQuery(reason),
            other => Error::Index(other),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the external language-model collaborator.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Model returned an empty completion")]
    EmptyResponse,
}

/// Failures of knowledge index reads and mutations.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Record '{0}' already exists")]
    DuplicateId(String),

    #[error("Record '{0}' not found")]
    UnknownId(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl IndexError {
    pub fn kind(&self) -> &'static str {
        match self {
            IndexError::InvalidQuery(_) => "invalid_query",
            IndexError::DuplicateId(_) => "duplicate_id",
            IndexError::UnknownId(_) => "unknown_id",
            IndexError::InvalidRecord(_) => "invalid_record",
            IndexError::Storage(_) => "storage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = ModelError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        };
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn unknown_id_keeps_its_kind() {
        let err: Error = IndexError::UnknownId("gone".into()).into();
        assert_eq!(err.kind(), "unknown_id");
    }

    #[test]
    fn index_invalid_query_lifts_to_top_level() {
        let err: Error = IndexError::InvalidQuery("empty".into()).into();
        assert!(matches!(err, Error::InvalidQuery(_)));
        assert_eq!(err.kind(), "invalid_query");
    }

    #[test]
    fn duplicate_id_keeps_its_kind() {
        let err: Error = IndexError::DuplicateId("adm-1".into()).into();
        assert!(matches!(err, Error::Index(IndexError::DuplicateId(_))));
        assert_eq!(err.kind(), "duplicate_id");
        assert!(err.to_string().contains("adm-1"));
    }
}
