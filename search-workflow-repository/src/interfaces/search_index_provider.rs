//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{BatchOperationSummary, IndexBatch, SearchPage};
use search_workflow_shared::{IndexSchema, SearchQuery};

/// Abstracts the underlying search index implementation (OpenSearch, in-memory, etc.).
///
/// Implementations are injected into `SearchIndexClient` to enable dependency injection
/// and easy testing. Input validation happens in the client; providers only translate
/// requests for their backend and map backend failures onto `SearchIndexError`.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check that the service is reachable and accepts the configured credential.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the service answered successfully
    /// * `Err(SearchIndexError::AuthError)` - If the credential was rejected
    /// * `Err(SearchIndexError::ConnectionError)` - If the service could not be reached
    async fn ping(&self) -> Result<(), SearchIndexError>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Delete an index.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the index existed and was removed
    /// * `Ok(false)` - If there was no such index
    /// * `Err(SearchIndexError)` - If the deletion fails
    async fn delete_index(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index from an already validated schema.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(SearchIndexError::SchemaError)` - If the service rejected the definition
    async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchIndexError>;

    /// Apply a batch of document actions in one request.
    ///
    /// # Arguments
    ///
    /// * `index` - Target index name
    /// * `batch` - Actions to apply, in order
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcomes; may contain failures
    /// * `Err(SearchIndexError)` - If the request failed as a whole
    async fn bulk(
        &self,
        index: &str,
        batch: &IndexBatch,
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Fetch one page of search results.
    ///
    /// # Arguments
    ///
    /// * `index` - Index to search
    /// * `query` - Query text, filter and ordering
    /// * `skip` - Number of leading results to skip
    /// * `take` - Maximum number of results on this page
    async fn search_page(
        &self,
        index: &str,
        query: &SearchQuery,
        skip: usize,
        take: usize,
    ) -> Result<SearchPage, SearchIndexError>;

    /// Number of documents currently visible to search.
    async fn document_count(&self, index: &str) -> Result<u64, SearchIndexError>;
}
