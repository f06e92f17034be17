//! Error types for ragcore operations.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! every subsystem boundary: parsing, chunking, summarization, version
//! detection, diffing, retrieval, LLM calls, store access, ingestion, and
//! query orchestration.

use thiserror::Error;

/// Result type alias for ragcore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for ragcore operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Document parsing errors (unsupported formats, malformed files).
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Chunking-related errors (text segmentation).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Summarization errors.
    #[error("summarization error: {0}")]
    Summarization(#[from] SummarizationError),

    /// Version detection errors.
    #[error("version detection error: {0}")]
    VersionDetection(#[from] VersionDetectionError),

    /// Diff engine errors.
    #[error("diff error: {0}")]
    Diff(#[from] DiffError),

    /// Hybrid retrieval errors.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// LLM client errors.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    /// Embedding generation errors.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Persistent store errors (vector, lexical, metadata, object).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Ingestion pipeline errors.
    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// Query orchestration errors.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Parser-specific errors.
#[derive(Error, Debug)]
pub enum ParseError {
    /// File extension has no registered parser.
    #[error("unsupported file format: {ext}")]
    UnsupportedFormat {
        /// The unrecognized extension, e.g. `.wpd`.
        ext: String,
    },

    /// The file could not be opened or decoded by the underlying format crate.
    #[error("failed to parse {path}: {reason}")]
    DecodeFailed {
        /// Path of the file being parsed.
        path: String,
        /// Underlying decode failure.
        reason: String,
    },

    /// File exceeds the configured size cap.
    #[error("file {path} ({size_mb} MB) exceeds max_file_size_mb {max_mb}")]
    FileTooLarge {
        /// Path of the offending file.
        path: String,
        /// Observed size in megabytes.
        size_mb: u64,
        /// Configured cap in megabytes.
        max_mb: u64,
    },
}

/// Chunking-specific errors for text processing.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid UTF-8 encountered at specific byte offset.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// Chunk size exceeds maximum allowed.
    #[error("chunk size {size} exceeds maximum {max}")]
    ChunkTooLarge {
        /// Actual chunk size in tokens.
        size: usize,
        /// Maximum allowed size in tokens.
        max: usize,
    },

    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },

    /// Tokenizer failed to encode a span of text.
    #[error("tokenizer failed: {0}")]
    TokenizerFailed(String),
}

/// Summarizer errors. Summarization failures are never fatal to ingestion
/// (see `ragcore::ingestion`), but the typed variant lets callers log the
/// structured reason before downgrading to an empty field.
#[derive(Error, Debug)]
pub enum SummarizationError {
    /// The LLM call underlying a summary request failed.
    #[error("summary generation failed: {0}")]
    LlmCallFailed(String),

    /// The LLM response did not match the expected JSON schema.
    #[error("malformed summary response: {0}")]
    MalformedResponse(String),
}

/// Version detector errors.
#[derive(Error, Debug)]
pub enum VersionDetectionError {
    /// Candidate lookup against the metadata or vector store failed.
    #[error("candidate lookup failed: {0}")]
    CandidateLookupFailed(String),

    /// LLM verification call failed or returned an unparsable result.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

/// Diff engine errors.
#[derive(Error, Debug)]
pub enum DiffError {
    /// One or both documents referenced by the diff do not exist.
    #[error("document not found: {doc_id}")]
    DocumentNotFound {
        /// Identifier of the missing document.
        doc_id: String,
    },

    /// The semantic (LLM) diff layer failed; layers 1-2 are still usable.
    #[error("semantic diff failed: {0}")]
    SemanticDiffFailed(String),
}

/// Hybrid retrieval errors.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Both the vector and lexical store failed for a single query.
    #[error("all retrieval sources failed: {0}")]
    AllSourcesFailed(String),

    /// The reranker failed; callers fall back to fused-rank order.
    #[error("rerank failed: {0}")]
    RerankFailed(String),
}

/// LLM client errors.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure (network, timeout) after exhausting retries.
    #[error("llm request failed after {attempts} attempts: {reason}")]
    RequestFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Underlying failure reason.
        reason: String,
    },

    /// The response failed schema validation.
    #[error("llm response failed schema validation: {0}")]
    SchemaValidation(String),

    /// No balanced JSON object could be extracted from a tolerant parse.
    #[error("no balanced JSON object found in response")]
    NoJsonFound,
}

/// Embedding generation errors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The embedding model failed to load.
    #[error("failed to load embedding model: {0}")]
    ModelLoadFailed(String),

    /// Inference failed for a batch of texts.
    #[error("embedding inference failed: {0}")]
    InferenceFailed(String),

    /// The caller asked to embed an empty string.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// The model returned a vector of the wrong dimensionality.
    #[error("embedding model returned {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        /// Dimensions actually returned.
        actual: usize,
        /// Dimensions the store/collection was configured for.
        expected: usize,
    },
}

/// Persistent store errors, one variant per store kind.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Vector store (Qdrant) failure.
    #[error("vector store error: {0}")]
    Vector(String),

    /// Lexical store (Tantivy) failure.
    #[error("lexical store error: {0}")]
    Lexical(String),

    /// Metadata store (SQLite via sqlx) failure.
    #[error("metadata store error: {0}")]
    Metadata(String),

    /// Object store (raw bytes) failure.
    #[error("object store error: {0}")]
    Object(String),

    /// A record expected to exist was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Ingestion pipeline errors.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// A document with the same content hash already exists.
    #[error("duplicate content, existing document: {existing_doc_id}")]
    Duplicate {
        /// Identifier of the pre-existing document.
        existing_doc_id: String,
    },

    /// The document referenced by an operation does not exist.
    #[error("document not found: {doc_id}")]
    DocumentNotFound {
        /// Identifier of the missing document.
        doc_id: String,
    },

    /// A pipeline stage failed and the document was marked `error`.
    #[error("ingestion failed at stage {stage}: {reason}")]
    StageFailed {
        /// Name of the pipeline stage that failed.
        stage: String,
        /// Underlying failure reason.
        reason: String,
    },
}

/// Query orchestration errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The question was empty or otherwise invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The agent loop exceeded its step cap without producing a final answer.
    #[error("agent loop exceeded step cap ({cap} steps)")]
    StepCapExceeded {
        /// Configured maximum number of steps.
        cap: u32,
    },

    /// A named tool was invoked with a missing required parameter.
    #[error("missing required parameter {param} for tool {tool}")]
    MissingToolParameter {
        /// Tool name.
        tool: String,
        /// Missing parameter name.
        param: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

// Implement From traits for standard library and third-party errors.

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::SchemaValidation(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for ChunkingError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.utf8_error().valid_up_to(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: test error");
    }

    #[test]
    fn test_ingestion_error_display() {
        let err = IngestionError::Duplicate {
            existing_doc_id: "doc-123".to_string(),
        };
        assert!(err.to_string().contains("doc-123"));
    }

    #[test]
    fn test_chunking_error_display() {
        let err = ChunkingError::OverlapTooLarge {
            overlap: 100,
            size: 50,
        };
        assert_eq!(
            err.to_string(),
            "overlap 100 must be less than chunk size 50"
        );
    }

    #[test]
    fn test_store_error_variants() {
        let err = StoreError::Vector("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));

        let err = StoreError::NotFound("chunk-1".to_string());
        assert!(err.to_string().contains("chunk-1"));
    }

    #[test]
    fn test_query_error_step_cap() {
        let err = QueryError::StepCapExceeded { cap: 8 };
        assert!(err.to_string().contains('8'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_chain_from_substorage() {
        let store_err = StoreError::Lexical("index locked".to_string());
        let err: Error = store_err.into();
        assert!(matches!(err, Error::Store(StoreError::Lexical(_))));
    }

    #[test]
    fn test_llm_error_no_json_found() {
        let err = LlmError::NoJsonFound;
        assert_eq!(err.to_string(), "no balanced JSON object found in response");
    }
}
