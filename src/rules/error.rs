//! Rule set construction errors.

use crate::fieldpath::PathParseError;
use thiserror::Error;

/// RuleError is raised while building a [`RuleSet`](super::RuleSet).
///
/// Every variant is fatal: a rule set that fails to build must not be used
/// for a merge.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("rule {category:?}: invalid pattern {pattern:?}: {message}")]
    InvalidPattern {
        category: String,
        pattern: String,
        message: String,
    },

    #[error("{field}: invalid path {path:?}: {source}")]
    InvalidPath {
        field: String,
        path: String,
        source: PathParseError,
    },

    #[error("invalid strategy {0:?}, expected highest, union or source:<id>")]
    InvalidStrategy(String),

    #[error("circular migration: {0}")]
    CircularMigration(String),

    #[error("rule book: {0}")]
    Parse(String),
}

impl RuleError {
    /// Creates an invalid path error.
    pub fn invalid_path(field: impl Into<String>, path: impl Into<String>, source: PathParseError) -> Self {
        RuleError::InvalidPath {
            field: field.into(),
            path: path.into(),
            source,
        }
    }
}
