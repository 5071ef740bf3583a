//! Error types shared by every mdxdb backend.

use mdxdb_embeddings::EmbeddingError;
use thiserror::Error;

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, MdxdbError>;

/// Errors surfaced by database and collection providers.
#[derive(Error, Debug)]
pub enum MdxdbError {
    /// A required credential or endpoint is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A vector does not have the expected number of components.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A document already exists at the target location.
    #[error("document already exists: {id} in collection {collection}")]
    DuplicateDocument { collection: String, id: String },

    /// Read or update of a document that does not exist.
    #[error("document not found: {id} in collection {collection}")]
    NotFound { collection: String, id: String },

    /// `vector_search` was called without a query vector.
    #[error("vector search requires a query vector")]
    MissingVector,

    /// The embedding provider failed.
    #[error("embedding generation failed: {0}")]
    EmbeddingGeneration(String),

    /// The columnar engine is older than the supported floor.
    ///
    /// The message is kept verbatim for callers that match on it.
    #[error("{0}")]
    UnsupportedEngineVersion(String),

    /// The engine answered with rows of an unexpected shape.
    #[error("unexpected response format: {0}")]
    UnexpectedResponseFormat(String),

    /// Reading or writing local storage failed.
    #[error("storage io error during {operation} on {path}: {message}")]
    StorageIo {
        operation: &'static str,
        path: String,
        message: String,
    },

    /// Local storage exists but cannot be parsed.
    #[error("corrupt storage at {path}: {message}")]
    CorruptStorage { path: String, message: String },

    /// The backend stages this operation out explicitly.
    #[error("{operation} is not implemented for collection {collection}")]
    NotImplemented {
        operation: &'static str,
        collection: String,
    },

    /// A remote call did not finish in time.
    #[error("{operation} timed out: {message}")]
    Timeout {
        operation: &'static str,
        message: String,
    },

    /// A filter expression could not be parsed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A document violates the identifier invariants or cannot be decoded.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A remote backend answered with an error status.
    #[error("{operation} failed with status {status}: {message}")]
    Remote {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// A remote backend could not be reached.
    #[error("{operation} could not reach the backend: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MdxdbError {
    /// Build a [`MdxdbError::StorageIo`] carrying the operation and path.
    pub fn storage_io(
        operation: &'static str,
        path: impl std::fmt::Display,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::StorageIo {
            operation,
            path: path.to_string(),
            message: err.to_string(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::DimensionMismatch { .. } => "DimensionMismatchError",
            Self::DuplicateDocument { .. } => "DuplicateDocumentError",
            Self::NotFound { .. } => "NotFoundError",
            Self::MissingVector => "MissingVectorError",
            Self::EmbeddingGeneration(_) => "EmbeddingGenerationError",
            Self::UnsupportedEngineVersion(_) => "UnsupportedEngineVersionError",
            Self::UnexpectedResponseFormat(_) => "UnexpectedResponseFormatError",
            Self::StorageIo { .. } => "StorageIOError",
            Self::CorruptStorage { .. } => "CorruptStorageError",
            Self::NotImplemented { .. } => "NotImplementedError",
            Self::Timeout { .. } => "TimeoutError",
            Self::InvalidFilter(_) => "InvalidFilterError",
            Self::InvalidDocument(_) => "InvalidDocumentError",
            Self::Remote { .. } => "RemoteError",
            Self::Transport { .. } => "TransportError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

impl From<EmbeddingError> for MdxdbError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            EmbeddingError::ProviderNotConfigured(message) => Self::Configuration(message),
            EmbeddingError::Timeout(message) => Self::Timeout {
                operation: "generate_embedding",
                message,
            },
            EmbeddingError::Generation(message) => Self::EmbeddingGeneration(message),
            other => Self::EmbeddingGeneration(other.to_string()),
        }
    }
}
