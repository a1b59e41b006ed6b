use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Lineage error: {0}")]
    Lineage(#[from] LineageError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by the score computers (agency and geometry)
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Invalid weights: {message}")]
    InvalidWeights { message: String },

    #[error("Malformed input: {field} - {reason}")]
    MalformedInput { field: String, reason: String },
}

/// Lineage graph errors
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("Node not found: {node_id}")]
    UnknownNode { node_id: String },

    #[error("Duplicate node id: {node_id}")]
    DuplicateNode { node_id: String },

    #[error("Stored hash does not match node content: {node_id}")]
    HashMismatch { node_id: String },

    #[error("Malformed input: {field} - {reason}")]
    MalformedInput { field: String, reason: String },

    #[error("Node serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Audit trail errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audit entry serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt audit log at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    #[error("Malformed audit entry: {field} - {reason}")]
    MalformedInput { field: String, reason: String },
}

impl ScoringError {
    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ScoringError::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl LineageError {
    pub(crate) fn unknown(node_id: impl Into<String>) -> Self {
        LineageError::UnknownNode {
            node_id: node_id.into(),
        }
    }

    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LineageError::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for scoring operations
pub type ScoringResult<T> = Result<T, ScoringError>;

/// Result type alias for lineage graph operations
pub type LineageResult<T> = Result<T, LineageError>;

/// Result type alias for audit trail operations
pub type AuditResult<T> = Result<T, AuditError>;
