use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in murmur-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors returned by an embedding backend.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("embedding input too large: {tokens} tokens exceeds limit of {limit}")]
    InputTooLarge { tokens: usize, limit: usize },

    #[error("embedding backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the memory subsystem (archive, retrieval, summary).
///
/// Remote failures from the embedding, storage, and LLM ports are folded
/// into `TransientIo`; absence of a collection or record stays `NotFound`
/// so callers can convert it into a safe default.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("transient I/O failure: {0}")]
    TransientIo(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("batch too large to embed: {tokens} tokens exceeds limit of {limit}")]
    BatchTooLarge { tokens: usize, limit: usize },

    #[error("turn belongs to partition '{actual}', buffer holds '{expected}'")]
    PartitionMismatch { expected: String, actual: String },
}

impl MemoryError {
    /// Whether this error only signals absence (a normal state, not a failure).
    pub fn is_not_found(&self) -> bool {
        matches!(self, MemoryError::NotFound(_))
    }
}

impl From<RepositoryError> for MemoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => MemoryError::NotFound("record".to_string()),
            other => MemoryError::TransientIo(other.to_string()),
        }
    }
}

impl From<EmbeddingError> for MemoryError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::InputTooLarge { tokens, limit } => {
                MemoryError::BatchTooLarge { tokens, limit }
            }
            other => MemoryError::TransientIo(other.to_string()),
        }
    }
}

impl From<LlmError> for MemoryError {
    fn from(err: LlmError) -> Self {
        MemoryError::TransientIo(err.to_string())
    }
}

/// Errors raised while validating an inbound message at the boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("unknown message category: '{0}'")]
    UnknownCategory(String),

    #[error("group message is missing a group name")]
    MissingGroupName,

    #[error("malformed message: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_repository_not_found_stays_not_found() {
        let err: MemoryError = RepositoryError::NotFound.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_repository_failures_become_transient() {
        let err: MemoryError = RepositoryError::Connection.into();
        assert!(matches!(err, MemoryError::TransientIo(_)));
    }

    #[test]
    fn test_embedding_errors_map_to_memory_errors() {
        let err: MemoryError = EmbeddingError::RateLimited {
            retry_after_ms: Some(500),
        }
        .into();
        assert!(matches!(err, MemoryError::TransientIo(_)));

        let err: MemoryError = EmbeddingError::InputTooLarge {
            tokens: 900,
            limit: 512,
        }
        .into();
        assert!(matches!(
            err,
            MemoryError::BatchTooLarge {
                tokens: 900,
                limit: 512
            }
        ));
    }

    #[test]
    fn test_partition_mismatch_display() {
        let err = MemoryError::PartitionMismatch {
            expected: "direct:Alice".to_string(),
            actual: "direct:Bob".to_string(),
        };
        assert!(err.to_string().contains("Alice"));
        assert!(err.to_string().contains("Bob"));
    }
}
