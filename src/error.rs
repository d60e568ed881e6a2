use std::time::Duration;
use thiserror::Error;

/// Failures produced by the document Q&A pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Chunking parameters violate their preconditions
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The declared file extension has no extractor
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The extractor recognised the format but could not read the content
    #[error("Failed to extract text: {0}")]
    ExtractionFailure(String),

    /// The embedding provider rejected or failed a request
    #[error("Embedding request failed: {0}")]
    EmbeddingFailure(String),

    /// Two vectors that must be compared have different lengths
    #[error("Dimension mismatch: expected {expected}D, got {actual}D")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Session creation failed; nothing was registered
    #[error("Error processing document: {0}")]
    IngestionFailure(#[source] Box<RagError>),

    /// No session is registered under the identifier
    #[error("Document not found: {0}")]
    NotFound(String),

    /// An external call exceeded its latency bound
    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    UpstreamTimeout {
        operation: &'static str,
        after: Duration,
    },

    /// The answer provider rejected or failed a request
    #[error("Answer generation failed: {0}")]
    GenerationFailure(String),
}

/// Discriminant of a [`RagError`], used by callers that translate failures
/// into transport-level codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    UnsupportedFormat,
    ExtractionFailure,
    EmbeddingFailure,
    DimensionMismatch,
    IngestionFailure,
    NotFound,
    UpstreamTimeout,
    GenerationFailure,
}

impl ErrorKind {
    /// Stable snake_case label for error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidConfiguration => "invalid_configuration",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ExtractionFailure => "extraction_failure",
            ErrorKind::EmbeddingFailure => "embedding_failure",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::IngestionFailure => "ingestion_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::GenerationFailure => "generation_failure",
        }
    }
}

impl RagError {
    /// Kind of this error, without looking through `IngestionFailure`
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            RagError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            RagError::ExtractionFailure(_) => ErrorKind::ExtractionFailure,
            RagError::EmbeddingFailure(_) => ErrorKind::EmbeddingFailure,
            RagError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            RagError::IngestionFailure(_) => ErrorKind::IngestionFailure,
            RagError::NotFound(_) => ErrorKind::NotFound,
            RagError::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            RagError::GenerationFailure(_) => ErrorKind::GenerationFailure,
        }
    }

    /// Kind of the underlying failure, unwrapping any `IngestionFailure` layers
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            RagError::IngestionFailure(inner) => inner.root_kind(),
            other => other.kind(),
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        self.root_kind() == ErrorKind::UpstreamTimeout
    }

    /// Wrap a session-creation failure, keeping a single `IngestionFailure` layer
    pub fn ingestion(err: RagError) -> Self {
        match err {
            wrapped @ RagError::IngestionFailure(_) => wrapped,
            other => RagError::IngestionFailure(Box::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
