//! Error types for nestsync core.

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while validating or synchronizing a data tree.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Submitted data failed a generated or declared rule.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Submitted data cannot be interpreted.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// A relationship path names a relation the entity type does not declare.
    #[error("entity type {entity_type} has no relation named {relation}")]
    UnknownRelation {
        /// The entity type that was asked.
        entity_type: String,
        /// The relation name.
        relation: String,
    },

    /// An entity type is not registered in the schema.
    #[error("unknown entity type: {name}")]
    UnknownEntityType {
        /// Name of the entity type.
        name: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The persistence collaborator failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

impl SyncError {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an unknown relation error.
    pub fn unknown_relation(entity_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            entity_type: entity_type.into(),
            relation: relation.into(),
        }
    }

    /// Creates an unknown entity type error.
    pub fn unknown_entity_type(name: impl Into<String>) -> Self {
        Self::UnknownEntityType { name: name.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns the validation failures if this is a validation error.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            SyncError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::invalid_input("cannot determine target type");
        assert_eq!(err.to_string(), "invalid input: cannot determine target type");

        let err = SyncError::unknown_relation("posts", "likes");
        assert!(err.to_string().contains("posts"));
        assert!(err.to_string().contains("likes"));
    }

    #[test]
    fn validation_errors_accessor() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "required", "The title field is required.");
        let err = SyncError::from(errors);

        let inner = err.validation_errors().unwrap();
        assert!(inner.has_rule("title", "required"));
        assert!(SyncError::storage("disk full").validation_errors().is_none());
    }
}
