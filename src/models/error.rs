//! Error types for the table mapper

use thiserror::Error;

/// Errors raised by a [`Store`](crate::models::Store) implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error reported by the database driver
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// The store returned a value outside the mapper's storage classes
    #[error("Unsupported column type: {0}")]
    UnsupportedType(String),
}

/// Errors that can occur while declaring schemas or running mapper operations
#[derive(Debug, Error)]
pub enum ModelError {
    /// Invalid schema declaration, detected before any statement is issued
    #[error("Invalid schema for table {table}: {reason}")]
    Schema { table: String, reason: String },

    /// `create` was called without every required column
    #[error("Not all required columns were provided for {table}: missing {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    /// `create` or a predicate referenced columns the table does not declare
    #[error("Unknown columns for {table}: {}", .columns.join(", "))]
    UnknownColumns { table: String, columns: Vec<String> },

    /// `find_one` matched nothing
    #[error("No row in {0} matched the query")]
    NotFound(String),

    /// A key lookup or keyed delete on a table without a unique column
    #[error("Table {0} declares no unique column")]
    NoPrimaryKey(String),

    /// A predicate query with no predicates
    #[error("Empty query against {0}")]
    EmptyQuery(String),

    /// Row shape or value type did not match the record
    #[error("Failed to decode row: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for ModelError {
    fn from(error: sqlx::Error) -> Self {
        Self::Store(StoreError::Sqlx(error))
    }
}

impl ModelError {
    pub(crate) fn schema(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the not-found condition of `find_one`
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for mapper operations
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModelError::schema("mute", "Unique keys can not be optional");
        assert_eq!(
            error.to_string(),
            "Invalid schema for table mute: Unique keys can not be optional"
        );

        let error = ModelError::MissingColumns {
            table: "ticket".to_string(),
            columns: vec!["owner".to_string(), "topic".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Not all required columns were provided for ticket: missing owner, topic"
        );

        let error = ModelError::NotFound("mailroom".to_string());
        assert!(error.is_not_found());
        assert_eq!(error.to_string(), "No row in mailroom matched the query");
    }
}
