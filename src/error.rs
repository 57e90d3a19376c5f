//! Error types for query compilation and execution

use thiserror::Error;

/// Errors raised while compiling or executing a portable query
#[derive(Debug, Error)]
pub enum QueryError {
    /// The target backend cannot express this condition kind or query feature
    #[error("Unsupported operation: {operation} is not supported by the {backend} backend")]
    UnsupportedOperation {
        backend: &'static str,
        operation: String,
    },

    /// Structural problem with the query or condition tree
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A value could not be mapped to or from a backend-native type
    #[error("Conversion error for field '{field}' of '{entity}': {message}")]
    Conversion {
        entity: String,
        field: String,
        message: String,
    },

    /// Two predicates were assigned the same parameter name
    #[error("Parameter binding conflict: '{0}' is already bound in this statement")]
    ParameterBindingConflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QueryError {
    pub fn unsupported(backend: &'static str, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            backend,
            operation: operation.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn conversion(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            entity: entity.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the unsupported condition kind, if this is an `UnsupportedOperation`
    pub fn unsupported_operation(&self) -> Option<&str> {
        match self {
            Self::UnsupportedOperation { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_backend_and_kind() {
        let err = QueryError::unsupported("cql", "NOT");
        assert_eq!(
            err.to_string(),
            "Unsupported operation: NOT is not supported by the cql backend"
        );
        assert_eq!(err.unsupported_operation(), Some("NOT"));
    }

    #[test]
    fn test_conversion_message_carries_entity_and_field() {
        let err = QueryError::conversion("Person", "address", "missing field 'zip'");
        let msg = err.to_string();
        assert!(msg.contains("'address'"));
        assert!(msg.contains("'Person'"));
        assert!(msg.contains("missing field 'zip'"));
        assert!(err.unsupported_operation().is_none());
    }

    #[test]
    fn test_driver_errors_surface_as_database() {
        let err: QueryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, QueryError::Database(_)));
        assert!(err.to_string().starts_with("Database error:"));
    }
}
