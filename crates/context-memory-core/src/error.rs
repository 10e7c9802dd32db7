//! Error types for Context Memory.
//!
//! Collaborator failures are wrapped into the variant naming the store
//! they came from, so callers can tell a vector index outage from a
//! language model outage without string matching.

use thiserror::Error;

/// Errors raised by a [`DocumentRepository`](crate::store::DocumentRepository).
///
/// Every variant carries the id of the document involved.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("document already exists: {id}")]
    AlreadyExists { id: String },

    #[error("repository failure for document {id}: {source}")]
    Backend {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RepositoryError {
    pub fn backend(id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Backend {
            id: id.into(),
            source: source.into(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::NotFound { id } | Self::AlreadyExists { id } | Self::Backend { id, .. } => id,
        }
    }
}

/// Errors that can occur in memory operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Request rejected before reaching the orchestrator.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A document-scoped failure during ingest or delete.
    #[error("processing failed for document {document_id}: {source}")]
    Processing {
        document_id: String,
        #[source]
        source: Box<MemoryError>,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("vector store error: {0}")]
    VectorStore(#[source] anyhow::Error),

    #[error("graph store error: {0}")]
    GraphStore(#[source] anyhow::Error),

    #[error("language service error: {0}")]
    LanguageService(#[source] anyhow::Error),

    #[error("{failed} of {total} documents failed to ingest")]
    BatchPartialFailure { failed: usize, total: usize },

    /// The readiness gate refused the operation.
    #[error("memory service not ready: unhealthy {0}")]
    NotReady(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl MemoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Attribute `err` to a document. Cancellation is never wrapped.
    pub fn processing(document_id: impl Into<String>, err: MemoryError) -> Self {
        match err {
            Self::Cancelled => Self::Cancelled,
            other => Self::Processing {
                document_id: document_id.into(),
                source: Box::new(other),
            },
        }
    }

    /// The document id this error is scoped to, if any.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Processing { document_id, .. } => Some(document_id),
            Self::Repository(err) => Some(err.id()),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_carry_id() {
        let err = RepositoryError::backend("doc-9", anyhow::anyhow!("disk full"));
        assert_eq!(err.id(), "doc-9");
        assert!(err.to_string().contains("disk full"));

        let wrapped: MemoryError = err.into();
        assert_eq!(wrapped.document_id(), Some("doc-9"));
    }

    #[test]
    fn test_processing_error_message() {
        let err = MemoryError::processing(
            "doc-1",
            MemoryError::VectorStore(anyhow::anyhow!("timeout")),
        );
        assert_eq!(err.document_id(), Some("doc-1"));
        assert_eq!(
            err.to_string(),
            "processing failed for document doc-1: vector store error: timeout"
        );
        assert!(MemoryError::VectorStore(anyhow::anyhow!("x"))
            .document_id()
            .is_none());
    }

    #[test]
    fn test_cancellation_is_not_wrapped() {
        let err = MemoryError::processing("doc-1", MemoryError::Cancelled);
        assert!(err.is_cancelled());
    }
}
