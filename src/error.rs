//! Error handling for the document provenance engine

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type returned by every public entry point
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("resource error: {0}")]
    Resource(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("insufficient documents: need at least {required}, have {actual}")]
    InsufficientDocuments { required: usize, actual: usize },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that indicate a broken provenance chain or foreign-key violation.
/// These are fatal for the enclosing transaction.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrityViolation(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("invalid workflow transition: from {from} to {to}, allowed: {allowed:?}")]
    InvalidTransition {
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    #[error("malformed provenance chain at {id}: {reason}")]
    MalformedChain { id: String, reason: String },
}

/// Errors surfaced by the worker orchestration layer. Workers never poison
/// the engine: a `WorkerError` is surfaced to the caller and the next call
/// proceeds normally.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker '{worker}' failed: {reason}")]
    Failed { worker: String, reason: String },

    #[error("worker '{worker}' timed out after {elapsed_ms}ms")]
    Timeout { worker: String, elapsed_ms: u64 },

    #[error("worker '{worker}' returned unparseable response: {reason}")]
    ParseError { worker: String, reason: String },

    #[error("worker binary unavailable: {0}")]
    Unavailable(String),
}

/// Schema/migration errors. Fatal for the enclosing transaction.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("migration {version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("FTS sync broken: missing trigger(s) {0:?}")]
    FtsSyncBroken(Vec<String>),

    #[error("database is ahead of the binary's target schema version ({current} > {target})")]
    AheadOfTarget { current: i64, target: i64 },

    #[error("required schema object missing: {0}")]
    MissingObject(String),
}

/// Stable category string used in the boundary error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    DatabaseNotSelected,
    DatabaseNotFound,
    DatabaseAlreadyExists,
    DocumentNotFound,
    ValidationError,
    ForeignKeyViolation,
    WorkerFailed,
    WorkerTimeout,
    WorkerParseError,
    WorkerUnavailable,
    InsufficientDocuments,
    PathNotFound,
    Conflict,
    Integrity,
    Schema,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseNotSelected => "DATABASE_NOT_SELECTED",
            Self::DatabaseNotFound => "DATABASE_NOT_FOUND",
            Self::DatabaseAlreadyExists => "DATABASE_ALREADY_EXISTS",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            Self::WorkerFailed => "WORKER_FAILED",
            Self::WorkerTimeout => "WORKER_TIMEOUT",
            Self::WorkerParseError => "WORKER_PARSE_ERROR",
            Self::WorkerUnavailable => "WORKER_UNAVAILABLE",
            Self::InsufficientDocuments => "INSUFFICIENT_DOCUMENTS",
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Integrity => "INTEGRITY",
            Self::Schema => "SCHEMA",
            Self::Internal => "INTERNAL",
        }
    }
}

impl EngineError {
    /// Whether a caller may reasonably retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Worker(WorkerError::Timeout { .. })
                | EngineError::Worker(WorkerError::Failed { .. })
        )
    }

    /// Stable category used by the boundary envelope.
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Validation(_) => ErrorCategory::ValidationError,
            EngineError::NotFound(_) => ErrorCategory::DocumentNotFound,
            EngineError::Conflict(_) => ErrorCategory::Conflict,
            EngineError::Integrity(IntegrityError::ForeignKeyViolation(_)) => {
                ErrorCategory::ForeignKeyViolation
            }
            EngineError::Integrity(_) => ErrorCategory::Integrity,
            EngineError::Worker(WorkerError::Failed { .. }) => ErrorCategory::WorkerFailed,
            EngineError::Worker(WorkerError::Timeout { .. }) => ErrorCategory::WorkerTimeout,
            EngineError::Worker(WorkerError::ParseError { .. }) => ErrorCategory::WorkerParseError,
            EngineError::Worker(WorkerError::Unavailable(_)) => ErrorCategory::WorkerUnavailable,
            EngineError::Resource(_) => ErrorCategory::PathNotFound,
            EngineError::Schema(_) => ErrorCategory::Schema,
            EngineError::InsufficientDocuments { .. } => ErrorCategory::InsufficientDocuments,
            EngineError::Database(_)
            | EngineError::Io(_)
            | EngineError::Serialization(_)
            | EngineError::Config(_) => ErrorCategory::Internal,
        }
    }
}
