//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations.

use thiserror::Error;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// The service rejected the supplied credential.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Failed to establish connection to the search service.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The index schema is invalid or was rejected by the service.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Validation error (e.g., missing required fields).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The target index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Failed to write a single document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Search query execution failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// A bulk request failed as a whole.
    #[error("Bulk operation error: {0}")]
    BulkOperationError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Some documents of a batch failed.
    #[error("Failed to index some of the documents: {}", .failed_keys.join(", "))]
    PartialIndexFailure { failed_keys: Vec<String> },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create an index not found error.
    pub fn index_not_found(index: impl Into<String>) -> Self {
        Self::IndexNotFound(index.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(msg: impl Into<String>) -> Self {
        Self::BulkOperationError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Create a partial index failure error.
    pub fn partial_index_failure(failed_keys: Vec<String>) -> Self {
        Self::PartialIndexFailure { failed_keys }
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the workflow cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthError(_) | Self::ConnectionError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_lists_keys() {
        let err = SearchIndexError::partial_index_failure(vec!["1".into(), "3".into()]);
        assert_eq!(
            err.to_string(),
            "Failed to index some of the documents: 1, 3"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(SearchIndexError::auth("denied").is_fatal());
        assert!(SearchIndexError::connection("refused").is_fatal());
        assert!(!SearchIndexError::schema("no key").is_fatal());
        assert!(!SearchIndexError::index_not_found("contents").is_fatal());
    }
}
