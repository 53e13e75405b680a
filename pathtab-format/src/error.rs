//! Error types for pathtab

use thiserror::Error;

/// pathtab error types
#[derive(Debug, Error)]
pub enum PathTabError {
    /// A configured output or traversal limit was exceeded.
    #[error("Limit exceeded: {what} reached {actual} (limit: {limit})")]
    LimitExceeded {
        /// Which limit tripped (e.g. "output bytes", "rows")
        what: &'static str,
        /// Configured limit
        limit: usize,
        /// Size observed when the limit tripped
        actual: usize,
    },
    /// A path key does not follow the path-key grammar.
    #[error("Invalid path key '{key}': {reason}")]
    InvalidPathKey {
        /// The offending key
        key: String,
        /// Explanation of the parse failure
        reason: String,
    },
    /// A skip or filter pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// Pattern text as supplied by the caller
        pattern: String,
        /// Underlying regex compile error
        source: regex::Error,
    },
    /// A row predicate or data-selection expression could not be evaluated.
    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression {
        /// Expression text
        expression: String,
        /// Explanation of the failure
        reason: String,
    },
    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A named graph filter was requested but never registered.
    #[error("Unknown graph filter: '{name}' is not registered")]
    UnknownGraph {
        /// Graph name from the mapper configuration
        name: String,
    },
    /// I/O operation failed while writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// YAML serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PathTabError {
    /// True when this error is a [`PathTabError::LimitExceeded`].
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, PathTabError::LimitExceeded { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PathTabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_exceeded_message_carries_sizes() {
        let err = PathTabError::LimitExceeded {
            what: "output bytes",
            limit: 10,
            actual: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("limit: 10"));
        assert!(err.is_limit_exceeded());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: PathTabError = io.into();
        assert!(matches!(err, PathTabError::Io(_)));
        assert!(!err.is_limit_exceeded());
    }
}
