//! Request and response types for search index operations.

use crate::errors::SearchIndexError;
use search_workflow_shared::Document;

/// A single write inside an [`IndexBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    /// Insert the document, replacing any document with the same key.
    Upload(Document),
    /// Insert the document. Fails for this document if the key already exists.
    Create(Document),
    /// Remove the document with the given key. Missing documents are not an error.
    Delete { key: String },
}

impl IndexAction {
    /// The document key this action targets.
    pub fn key(&self) -> &str {
        match self {
            Self::Upload(doc) | Self::Create(doc) => doc.id.as_str(),
            Self::Delete { key } => key.as_str(),
        }
    }

    /// The document carried by this action, if any.
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Upload(doc) | Self::Create(doc) => Some(doc),
            Self::Delete { .. } => None,
        }
    }
}

/// An ordered set of document writes sent in one request.
///
/// Each action succeeds or fails independently; see [`BatchOperationSummary`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBatch {
    pub actions: Vec<IndexAction>,
}

impl IndexBatch {
    /// Batch that upserts every document.
    pub fn upload(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            actions: documents.into_iter().map(IndexAction::Upload).collect(),
        }
    }

    /// Batch that inserts every document, failing per document on existing keys.
    pub fn create(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            actions: documents.into_iter().map(IndexAction::Create).collect(),
        }
    }

    /// Batch that deletes every key.
    pub fn delete<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            actions: keys
                .into_iter()
                .map(|key| IndexAction::Delete { key: key.into() })
                .collect(),
        }
    }

    /// Append an action.
    pub fn push(&mut self, action: IndexAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Result of a batch operation for a single item.
///
/// This struct represents the outcome of a single action within a batch. It indicates
/// whether the action succeeded and includes error details if it failed.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// Key of the targeted document.
    pub key: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Per-item status code reported by the service, when available.
    pub status: Option<u16>,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

impl BatchOperationResult {
    pub fn succeeded(key: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            key: key.into(),
            success: true,
            status,
            error: None,
        }
    }

    pub fn failed(key: impl Into<String>, status: Option<u16>, error: SearchIndexError) -> Self {
        Self {
            key: key.into(),
            success: false,
            status,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This struct provides a complete overview of a bulk operation, including the total
/// number of items processed, how many succeeded and failed, and detailed results for
/// each individual item. This allows callers to handle partial failures gracefully.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item, in batch order.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Keys of the items that failed.
    pub fn failed_keys(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.key.as_str())
            .collect()
    }

    /// Whether some, but not all, items failed.
    pub fn is_partial_failure(&self) -> bool {
        self.failed > 0 && self.succeeded > 0
    }

    /// Turn any per-item failure into a `PartialIndexFailure` error.
    pub fn into_result(self) -> Result<Self, SearchIndexError> {
        if self.failed == 0 {
            return Ok(self);
        }
        let failed_keys = self.failed_keys().into_iter().map(String::from).collect();
        Err(SearchIndexError::partial_index_failure(failed_keys))
    }
}

/// One page of search hits.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Documents on this page, in result order.
    pub documents: Vec<Document>,
    /// Total number of matches reported by the service, if known.
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_batch_keys() {
        let batch = IndexBatch::upload(vec![
            Document::new("1", "Mohsin JK", "bla bla"),
            Document::new("2", "Mohsin Javed Khan", "bla bla"),
        ]);

        let keys: Vec<&str> = batch.actions.iter().map(IndexAction::key).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert!(matches!(batch.actions[0], IndexAction::Upload(_)));
    }

    #[test]
    fn test_delete_batch_has_no_documents() {
        let batch = IndexBatch::delete(["1", "2"]);
        assert_eq!(batch.len(), 2);
        assert!(batch.actions.iter().all(|a| a.document().is_none()));
    }

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded("1", Some(201)),
            BatchOperationResult::failed("2", Some(409), SearchIndexError::index("exists")),
            BatchOperationResult::succeeded("3", Some(201)),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_keys(), vec!["2"]);
        assert!(summary.is_partial_failure());
    }

    #[test]
    fn test_into_result_partial_failure() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded("1", None),
            BatchOperationResult::failed("2", None, SearchIndexError::index("exists")),
        ]);

        match summary.into_result() {
            Err(SearchIndexError::PartialIndexFailure { failed_keys }) => {
                assert_eq!(failed_keys, vec!["2".to_string()]);
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
    }

    #[test]
    fn test_into_result_all_succeeded() {
        let summary =
            BatchOperationSummary::from_results(vec![BatchOperationResult::succeeded("1", None)]);
        assert!(summary.into_result().is_ok());
    }
}
