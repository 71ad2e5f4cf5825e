//! Search index client implementation.
//!
//! This module provides the main client for interacting with the search service.
//! Application code uses this to manage indexes, write documents and query them.

use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BatchOperationSummary, IndexBatch};
use search_workflow_shared::{Document, FieldDefinition, FieldType, IndexSchema, SearchQuery};

/// The main client for interacting with the search service.
/// Application code uses this to create and delete indexes, upload documents and search.
pub struct SearchIndexClient {
    provider: Box<dyn SearchIndexProvider>,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    /// Create a new SearchIndexClient with default configuration.
    pub fn new(provider: Box<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexConfig::default(),
        }
    }

    /// Create a new SearchIndexClient with custom configuration.
    pub fn with_config(provider: Box<dyn SearchIndexProvider>, config: SearchIndexConfig) -> Self {
        Self { provider, config }
    }

    /// Create a client and verify the service accepts it.
    ///
    /// Fails with `AuthError` when the credential is rejected and with
    /// `ConnectionError` when the service cannot be reached.
    pub async fn connect(
        provider: Box<dyn SearchIndexProvider>,
        config: SearchIndexConfig,
    ) -> Result<Self, SearchIndexError> {
        provider.ping().await?;
        Ok(Self::with_config(provider, config))
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Delete an index if it exists.
    /// Input: index name
    /// Output: Result<bool, SearchIndexError> (true if an index was removed)
    pub async fn delete_index_if_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        if index.is_empty() {
            return Err(SearchIndexError::validation("index name is required"));
        }

        let deleted = self.provider.delete_index(index).await?;
        if deleted {
            info!(index = %index, "Deleted index");
        } else {
            debug!(index = %index, "Index did not exist");
        }
        Ok(deleted)
    }

    /// Check whether an index exists.
    pub async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        if index.is_empty() {
            return Err(SearchIndexError::validation("index name is required"));
        }
        self.provider.index_exists(index).await
    }

    /// Create an index from a schema.
    /// Input: IndexSchema (name plus ordered field definitions)
    /// Output: Result<(), SearchIndexError>
    ///
    /// The schema is validated before any request is sent; see [`validate_schema`].
    pub async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchIndexError> {
        validate_schema(schema)?;
        self.provider.create_index(schema).await?;
        info!(index = %schema.name, fields = schema.fields.len(), "Created index");
        Ok(())
    }

    /// Apply a batch of document actions to an index.
    /// Input: index name, IndexBatch
    /// Output: Result<BatchOperationSummary, SearchIndexError>
    ///
    /// Individual failures are reported in the summary and are not retried.
    /// The batch size is limited by the configured max_batch_size (default: 1000).
    pub async fn upload_documents(
        &self,
        index: &str,
        batch: &IndexBatch,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if index.is_empty() {
            return Err(SearchIndexError::validation("index name is required"));
        }
        if batch.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        self.validate_batch_size(batch.len())?;

        // Validate all actions
        for action in &batch.actions {
            if action.key().is_empty() {
                return Err(SearchIndexError::validation(
                    "All actions must have a document key",
                ));
            }
        }

        let summary = self.provider.bulk(index, batch).await?;
        if summary.failed > 0 {
            warn!(
                index = %index,
                failed = summary.failed,
                keys = %summary.failed_keys().join(", "),
                "Failed to index some of the documents"
            );
        } else {
            debug!(index = %index, count = summary.succeeded, "Batch indexed");
        }
        Ok(summary)
    }

    /// Number of documents currently visible to search in an index.
    pub async fn document_count(&self, index: &str) -> Result<u64, SearchIndexError> {
        self.provider.document_count(index).await
    }

    /// Query an index.
    /// Input: index name, SearchQuery (text, optional filter, ordering, limits)
    /// Output: SearchResults, a lazy stream of documents in result order
    ///
    /// Pages are requested from the service only as the stream is polled. The
    /// stream ends after a short page or once `top` documents were produced, and
    /// cannot be restarted.
    pub fn search(&self, index: &str, query: SearchQuery) -> SearchResults<'_> {
        if let Err(e) = validate_query(index, &query) {
            return SearchResults::failed(e);
        }

        let provider: &dyn SearchIndexProvider = self.provider.as_ref();
        let index = index.to_string();
        let cursor = PageCursor::new(query.page_size, query.top);

        let pages = stream::try_unfold(cursor, move |cursor| {
            let index = index.clone();
            let query = query.clone();
            async move {
                let Some(take) = cursor.next_take() else {
                    return Ok(None);
                };
                let page = provider
                    .search_page(&index, &query, cursor.fetched, take)
                    .await?;
                debug!(
                    index = %index,
                    skip = cursor.fetched,
                    returned = page.documents.len(),
                    "Fetched result page"
                );
                let next = cursor.advance(page.documents.len(), take, page.total);
                let documents = stream::iter(
                    page.documents
                        .into_iter()
                        .map(Ok::<Document, SearchIndexError>),
                );
                Ok::<_, SearchIndexError>(Some((documents, next)))
            }
        });

        SearchResults {
            inner: pages.try_flatten().boxed(),
        }
    }
}

/// Validate an index schema before it is sent to the service.
///
/// Rules:
/// - the index name and field list must not be empty
/// - field names must be non-empty and unique
/// - exactly one field is the key, and it must be a string
/// - only string fields may be searchable
pub fn validate_schema(schema: &IndexSchema) -> Result<(), SearchIndexError> {
    if schema.name.is_empty() {
        return Err(SearchIndexError::schema("index name is required"));
    }
    if schema.fields.is_empty() {
        return Err(SearchIndexError::schema(format!(
            "index '{}' has no fields",
            schema.name
        )));
    }

    let mut seen = HashSet::new();
    for field in &schema.fields {
        if field.name.is_empty() {
            return Err(SearchIndexError::schema("field name is required"));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(SearchIndexError::schema(format!(
                "duplicate field '{}'",
                field.name
            )));
        }
        if field.searchable && field.field_type != FieldType::String {
            return Err(SearchIndexError::schema(format!(
                "field '{}' is searchable but not a string",
                field.name
            )));
        }
    }

    let keys: Vec<&FieldDefinition> = schema.fields.iter().filter(|f| f.key).collect();
    match keys.as_slice() {
        [] => Err(SearchIndexError::schema(format!(
            "index '{}' has no key field",
            schema.name
        ))),
        [key] => {
            if key.field_type != FieldType::String {
                return Err(SearchIndexError::schema(format!(
                    "key field '{}' must be a string",
                    key.name
                )));
            }
            Ok(())
        }
        many => Err(SearchIndexError::schema(format!(
            "index '{}' has multiple key fields: {}",
            schema.name,
            many.iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

fn validate_query(index: &str, query: &SearchQuery) -> Result<(), SearchIndexError> {
    if index.is_empty() {
        return Err(SearchIndexError::validation("index name is required"));
    }
    if query.page_size == 0 {
        return Err(SearchIndexError::validation("page_size must be greater than zero"));
    }
    if query.order_by.iter().any(|o| o.field.is_empty()) {
        return Err(SearchIndexError::validation("order_by field is required"));
    }
    Ok(())
}

/// Paging state for a result stream.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    page_size: usize,
    top: Option<usize>,
    fetched: usize,
    exhausted: bool,
}

impl PageCursor {
    fn new(page_size: usize, top: Option<usize>) -> Self {
        Self {
            page_size,
            top,
            fetched: 0,
            exhausted: false,
        }
    }

    /// Size of the next page, or None once the stream is complete.
    fn next_take(&self) -> Option<usize> {
        if self.exhausted {
            return None;
        }
        let remaining = match self.top {
            Some(top) => top.saturating_sub(self.fetched),
            None => self.page_size,
        };
        let take = remaining.min(self.page_size);
        (take > 0).then_some(take)
    }

    /// Record a page. A short page, or reaching the reported total, ends the stream.
    fn advance(self, returned: usize, requested: usize, total: Option<u64>) -> Self {
        let fetched = self.fetched + returned;
        let reached_total = total.is_some_and(|total| fetched as u64 >= total);
        Self {
            fetched,
            exhausted: returned < requested || reached_total,
            ..self
        }
    }
}

/// A lazy, finite stream of search results.
///
/// Consuming the stream drives the underlying page requests. Once exhausted or
/// failed it yields nothing further.
pub struct SearchResults<'a> {
    inner: BoxStream<'a, Result<Document, SearchIndexError>>,
}

impl<'a> SearchResults<'a> {
    fn failed(error: SearchIndexError) -> Self {
        Self {
            inner: stream::once(async move { Err(error) }).boxed(),
        }
    }

    /// Drain the stream into a vector.
    pub async fn collect_documents(self) -> Result<Vec<Document>, SearchIndexError> {
        self.try_collect().await
    }
}

impl Stream for SearchResults<'_> {
    type Item = Result<Document, SearchIndexError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
