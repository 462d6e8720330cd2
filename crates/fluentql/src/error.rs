//! Error types for fluentql

use thiserror::Error;

/// Result type alias for fluentql operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for query building, execution and relation resolution.
///
/// Variants fall into four groups:
/// - backend failures raised by the [`GenericClient`](crate::GenericClient)
/// - contract violations detected before anything is executed
/// - relation resolution failures
/// - decoding/configuration failures
#[derive(Debug, Error)]
pub enum DbError {
    /// Statement failed inside the SQL engine
    #[error("Backend error: {0}")]
    Backend(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Builder state that cannot be compiled (bad identifier, bad payload, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// UPDATE/DELETE without any filter and without `.all()`
    #[error("{operation} on '{table}' requires at least one filter (use .all() to target every row)")]
    MissingFilter {
        operation: &'static str,
        table: String,
    },

    /// `IN` with an empty list reached the compiler
    #[error("IN filter on '{column}' has an empty value list")]
    EmptyInList { column: String },

    /// Embedded resource could not be resolved
    #[error("Relation error: {0}")]
    Relation(String),

    /// Row decode/mapping error
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),
}

impl DbError {
    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a relation error
    pub fn relation(message: impl Into<String>) -> Self {
        Self::Relation(message.into())
    }

    /// Whether the error was raised before reaching the database.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::MissingFilter { .. } | Self::EmptyInList { .. }
        )
    }

    /// Whether the error came from the SQL engine.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::Backend(_)
                | Self::UniqueViolation(_)
                | Self::ForeignKeyViolation(_)
                | Self::CheckViolation(_)
        )
    }

    /// Check if this is a relation resolution error
    pub fn is_relation_error(&self) -> bool {
        matches!(self, Self::Relation(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a rusqlite error into a more specific DbError
    #[cfg(feature = "sqlite")]
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        use rusqlite::ffi;

        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            let message = message.clone().unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::UniqueViolation(message);
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return Self::ForeignKeyViolation(message),
                ffi::SQLITE_CONSTRAINT_CHECK => return Self::CheckViolation(message),
                _ => {}
            }
        }
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_and_backend_categories_are_disjoint() {
        let contract = [
            DbError::validation("bad column"),
            DbError::MissingFilter {
                operation: "UPDATE",
                table: "invoices".to_string(),
            },
            DbError::EmptyInList {
                column: "id".to_string(),
            },
        ];
        for err in &contract {
            assert!(err.is_contract_violation());
            assert!(!err.is_backend_error());
        }

        let backend = DbError::backend("no such table: foo");
        assert!(backend.is_backend_error());
        assert!(!backend.is_contract_violation());
        assert!(DbError::relation("ambiguous").is_relation_error());
    }

    #[test]
    fn missing_filter_message_names_the_escape_hatch() {
        let err = DbError::MissingFilter {
            operation: "DELETE",
            table: "bills".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DELETE on 'bills' requires at least one filter (use .all() to target every row)"
        );
    }
}
