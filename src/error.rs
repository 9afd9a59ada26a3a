//! Error taxonomy for the pipeline, per spec §7.
//!
//! Mirrors the teacher's habit of a small `thiserror`/`Fail`-derived enum per
//! module boundary, with `anyhow::Error` used internally for anything that
//! isn't a user-facing, codeable condition. Every externally visible failure
//! mode gets its own variant here so `code()`/`http_status()` are total
//! functions, not string matches.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    // --- Input envelope ---
    #[error("unsupported or missing content type")]
    InvalidContentType,
    #[error("no file was supplied")]
    FileMissing,
    #[error("the uploaded file was empty")]
    FileEmpty,
    #[error("the uploaded file exceeds the {limit_bytes} byte limit")]
    FileSizeLimitExceeded { limit_bytes: u64 },
    #[error("the request payload could not be parsed: {reason}")]
    InvalidPayload { reason: String },
    #[error("commit payload has {got} rows, exceeding the {limit} row limit")]
    RowsLimitExceeded { got: usize, limit: usize },

    // --- Delimited mapping ---
    #[error("invalid column mapping: {reason}")]
    InvalidMapping { reason: String },
    #[error("mapping field was not valid JSON: {reason}")]
    InvalidMappingJson { reason: String },
    #[error("mapping referenced columns not present in the file")]
    InvalidMappingColumns { missing: Vec<String> },

    // --- Portable document ---
    #[error("this document requires a password")]
    PdfPasswordRequired,
    #[error("the supplied password did not decrypt the document")]
    PdfPasswordInvalid,
    #[error("no transactions were found in the document")]
    PdfNoTransactions,
    #[error("no parser is available for this source: {technical_reason}")]
    SourceParserUnavailable {
        technical_reason: String,
        supported_issuer_profiles: Vec<&'static str>,
    },

    // --- Rule authoring ---
    #[error("rule pattern does not compile: {reason}")]
    InvalidPattern { reason: String },

    // --- Fatal / unexpected ---
    #[error("import parsing failed unexpectedly")]
    ImportParseFailed(#[source] anyhow::Error),
    #[error("import commit failed unexpectedly")]
    ImportCommitFailed(#[source] anyhow::Error),

    // --- Storage ---
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl PipelineError {
    /// The stable machine-readable code, per spec §7. Never shown directly
    /// to end users; translatable strings are keyed by this.
    pub fn code(&self) -> &'static str {
        use PipelineError::*;
        match self {
            InvalidContentType => "invalid_content_type",
            FileMissing => "file_missing",
            FileEmpty => "file_empty",
            FileSizeLimitExceeded { .. } => "file_size_limit_exceeded",
            InvalidPayload { .. } => "invalid_payload",
            RowsLimitExceeded { .. } => "rows_limit_exceeded",
            InvalidMapping { .. } => "invalid_mapping",
            InvalidMappingJson { .. } => "invalid_mapping_json",
            InvalidMappingColumns { .. } => "invalid_mapping_columns",
            PdfPasswordRequired => "pdf_password_required",
            PdfPasswordInvalid => "pdf_password_invalid",
            PdfNoTransactions => "pdf_no_transactions",
            SourceParserUnavailable { .. } => "source_parser_unavailable",
            InvalidPattern { .. } => "invalid_pattern",
            ImportParseFailed(_) => "import_parse_failed",
            ImportCommitFailed(_) => "import_commit_failed",
            Storage(_) => "import_commit_failed",
        }
    }

    pub fn http_status(&self) -> u16 {
        use PipelineError::*;
        match self {
            FileSizeLimitExceeded { .. } => 413,
            ImportParseFailed(_) | ImportCommitFailed(_) | Storage(_) => 500,
            _ => 422,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// `StorageError` is the typed failure surfaced by the repository façade
/// (spec §4.9): any driver-level failure, never a raw driver error type.
#[derive(Debug, Error)]
#[error("{context}: {source}")]
pub struct StorageError {
    pub context: String,
    #[source]
    pub source: anyhow::Error,
}

impl StorageError {
    pub fn new(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self {
            context: context.into(),
            source: source.into(),
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(e: StorageError) -> Self {
        PipelineError::Storage(e.into())
    }
}
