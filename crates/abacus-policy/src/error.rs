//! Access-control engine error types.
//!
//! Evaluation entry points never return these errors: an evaluation failure
//! becomes a fail-closed decision. Errors surface only from policy
//! administration, attribute validation and the collaborator ports.

use std::fmt;

use crate::policy::resources::{AttributeValidationError, ValidationError};

/// Errors that can occur in the access-control engine.
#[derive(Debug, thiserror::Error)]
pub enum AbacError {
    /// Input failed validation (policy create/update, attribute values).
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the violated rule.
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "Policy".
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The operation conflicts with existing state.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The policy store or repository failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The decision cache failed.
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache error.
        message: String,
    },

    /// The organization hierarchy provider failed.
    #[error("Hierarchy error: {message}")]
    Hierarchy {
        /// Description of the hierarchy error.
        message: String,
    },

    /// The engine is misconfigured.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AbacError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Cache` error.
    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Creates a new `Hierarchy` error.
    #[must_use]
    pub fn hierarchy(message: impl Into<String>) -> Self {
        Self::Hierarchy {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller supplied bad input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::Conflict { .. }
        )
    }

    /// Returns `true` if an infrastructure component failed.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Cache { .. }
                | Self::Hierarchy { .. }
                | Self::Configuration { .. }
                | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::Lookup,
            Self::Conflict { .. } => ErrorCategory::Validation,
            Self::Storage { .. } | Self::Cache { .. } | Self::Hierarchy { .. } => {
                ErrorCategory::Infrastructure
            }
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<ValidationError> for AbacError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<AttributeValidationError> for AbacError {
    fn from(err: AttributeValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<abacus_config::ConfigError> for AbacError {
    fn from(err: abacus_config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

/// Categories of engine errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input at create/update time.
    Validation,
    /// Entity lookups that found nothing.
    Lookup,
    /// Store, cache or hierarchy provider failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Lookup => write!(f, "lookup"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AbacError::not_found("Policy", "p-1");
        assert_eq!(err.to_string(), "Policy not found: p-1");

        let err = AbacError::storage("connection refused");
        assert_eq!(err.to_string(), "Storage error: connection refused");
    }

    #[test]
    fn test_error_predicates() {
        assert!(AbacError::validation("x").is_client_error());
        assert!(AbacError::not_found("Policy", "x").is_client_error());
        assert!(!AbacError::not_found("Policy", "x").is_server_error());
        assert!(AbacError::cache("x").is_server_error());
        assert!(AbacError::hierarchy("x").is_server_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AbacError::validation("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            AbacError::not_found("PolicySet", "x").category(),
            ErrorCategory::Lookup
        );
        assert_eq!(
            AbacError::storage("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }

    #[test]
    fn test_from_validation_error() {
        let err: AbacError = ValidationError::InvalidPriority(2000).into();
        assert!(matches!(err, AbacError::Validation { .. }));
        assert!(err.to_string().contains("2000"));
    }
}
