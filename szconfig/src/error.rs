//! Error types for configuration operations.
//!
//! Errors fall in two families: the request itself was not acceptable
//! (validation, not found, duplicate, blocked by dependents), or something
//! downstream of the request failed (backend, JSON, I/O). Callers use
//! [`ConfigError::is_not_found`] and [`ConfigError::is_downstream`] to tell
//! them apart.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Errors produced by configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested record does not exist.
    #[error("{entity} {key} not found")]
    NotFound {
        /// Entity kind, e.g. `feature`.
        entity: &'static str,
        /// Code or ID that was looked up.
        key: String,
    },

    /// A record with the same identifying code already exists.
    #[error("{entity} {key} already exists")]
    Duplicate {
        /// Entity kind, e.g. `data source`.
        entity: &'static str,
        /// Code that collided.
        key: String,
    },

    /// Deletion refused because other rows still reference the record.
    #[error("{entity} {key} is still referenced by {count} row(s) in {table}")]
    HasDependents {
        /// Entity kind being deleted.
        entity: &'static str,
        /// Code or ID being deleted.
        key: String,
        /// Table holding the referencing rows.
        table: &'static str,
        /// Number of referencing rows in that table.
        count: usize,
    },

    /// The request was malformed or violates a rule of the configuration.
    #[error("{0}")]
    Validation(String),

    /// No configuration is resident in the session.
    #[error("no configuration is loaded")]
    NotLoaded,

    /// The configuration repository rejected or failed an operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A configuration document could not be parsed or encoded.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File system access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::NotFound`].
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        ConfigError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for [`ConfigError::Duplicate`].
    pub fn duplicate(entity: &'static str, key: impl ToString) -> Self {
        ConfigError::Duplicate {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for [`ConfigError::Validation`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Validation(msg.into())
    }

    /// Whether the error means "the record is absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }

    /// Whether the error came from the repository, the JSON codec or the
    /// file system rather than from the request itself.
    pub fn is_downstream(&self) -> bool {
        matches!(
            self,
            ConfigError::Backend(_) | ConfigError::Json(_) | ConfigError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(ConfigError::not_found("feature", "NAME").is_not_found());
        assert!(!ConfigError::not_found("feature", "NAME").is_downstream());
        assert!(ConfigError::Backend("offline".into()).is_downstream());
        assert!(!ConfigError::invalid("bad").is_downstream());
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::HasDependents {
            entity: "feature",
            key: "NAME".into(),
            table: "CFG_ATTR",
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "feature NAME is still referenced by 2 row(s) in CFG_ATTR"
        );
        assert_eq!(
            ConfigError::duplicate("data source", "CUSTOMER").to_string(),
            "data source CUSTOMER already exists"
        );
    }
}
