//! Error types for docclass

use crate::types::ClassificationError;

/// Result type alias using docclass's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for docclass operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed rule or predicate at authoring time
    #[error("validation error: {0}")]
    Validation(String),

    /// Stale expected version on a rule update
    #[error("conflict on rule '{rule_id}': expected version {expected}, found {actual}")]
    Conflict {
        rule_id: String,
        expected: u64,
        actual: u64,
    },

    /// Unknown rule id
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed document handed to the engine
    #[error("engine error: {0}")]
    Engine(String),

    /// Per-item failure inside a batch
    #[error("classification error for document '{}': {}", .0.document_id, .0.reason)]
    Classification(ClassificationError),

    /// Rule persistence errors
    #[error("repository error: {0}")]
    Repository(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Work stopped by a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new conflict error
    pub fn conflict(rule_id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            rule_id: rule_id.into(),
            expected,
            actual,
        }
    }

    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a new repository error
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable name of the error variant.
    ///
    /// Used as a metrics label and by the web layer to pick a status code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict { .. } => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Engine(_) => "engine",
            Self::Classification(_) => "classification",
            Self::Repository(_) => "repository",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the caller may succeed by re-fetching and retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<ClassificationError> for Error {
    fn from(err: ClassificationError) -> Self {
        Self::Classification(err)
    }
}
