//! Error types for docvec

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::embedding::ProviderError;

/// Result type alias for docvec operations
pub type Result<T> = std::result::Result<T, DocvecError>;

/// Error types that can occur while storing, embedding or ranking documents
#[derive(Error, Debug)]
pub enum DocvecError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),

    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(#[from] ProviderError),

    #[error("Embedding provider timed out after {after:?}")]
    EmbeddingTimeout { after: Duration },

    #[error("No ingestible documents found: {0}")]
    CorpusEmpty(String),

    #[error("Batch aborted at document {index} after {ingested} were ingested: {source}")]
    BatchAborted {
        index: usize,
        ingested: usize,
        #[source]
        source: Box<DocvecError>,
    },

    #[error("Corpus unavailable at {}: {source}", path.display())]
    CorpusUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
