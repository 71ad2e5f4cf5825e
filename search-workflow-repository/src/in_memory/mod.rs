//! In-process implementation of `SearchIndexProvider`.
//!
//! Keeps every index in memory. Text matching is a simple lowercase token match
//! over the searchable fields, scored by the share of each field's tokens that
//! match the query. Writes can be held back for a number of count polls to
//! mimic a service that indexes asynchronously.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{
    BatchOperationResult, BatchOperationSummary, IndexAction, IndexBatch, SearchPage,
};
use search_workflow_shared::{Document, Filter, IndexSchema, SearchQuery};

#[derive(Debug)]
struct StoredIndex {
    schema: IndexSchema,
    /// Documents visible to search, in insertion order.
    visible: Vec<Document>,
    /// Actions accepted but not yet visible.
    pending: Vec<IndexAction>,
    /// Count polls left before `pending` becomes visible.
    polls_until_visible: usize,
}

impl StoredIndex {
    fn new(schema: IndexSchema) -> Self {
        Self {
            schema,
            visible: Vec::new(),
            pending: Vec::new(),
            polls_until_visible: 0,
        }
    }

    /// Whether a key exists, counting writes that are not visible yet.
    fn contains(&self, key: &str) -> bool {
        let mut present = self.visible.iter().any(|d| d.id == key);
        for action in &self.pending {
            match action {
                IndexAction::Upload(doc) | IndexAction::Create(doc) if doc.id == key => {
                    present = true
                }
                IndexAction::Delete { key: deleted } if deleted == key => present = false,
                _ => {}
            }
        }
        present
    }

    fn apply(&mut self, action: IndexAction) {
        match action {
            IndexAction::Upload(doc) | IndexAction::Create(doc) => {
                match self.visible.iter_mut().find(|d| d.id == doc.id) {
                    Some(existing) => *existing = doc,
                    None => self.visible.push(doc),
                }
            }
            IndexAction::Delete { key } => self.visible.retain(|d| d.id != key),
        }
    }

    fn publish(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for action in pending {
            self.apply(action);
        }
    }
}

/// In-memory search backend.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    indexes: Mutex<HashMap<String, StoredIndex>>,
    visibility_lag: usize,
}

impl InMemoryProvider {
    /// Create a provider whose writes are visible immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider whose writes become visible after `polls` calls to
    /// `document_count` on the written index.
    pub fn with_visibility_lag(polls: usize) -> Self {
        Self {
            indexes: Mutex::new(HashMap::new()),
            visibility_lag: polls,
        }
    }

    /// Make all pending writes visible.
    pub async fn refresh(&self) {
        let mut indexes = self.indexes.lock().await;
        for stored in indexes.values_mut() {
            stored.publish();
        }
    }
}

#[async_trait]
impl SearchIndexProvider for InMemoryProvider {
    async fn ping(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        Ok(self.indexes.lock().await.contains_key(index))
    }

    async fn delete_index(&self, index: &str) -> Result<bool, SearchIndexError> {
        Ok(self.indexes.lock().await.remove(index).is_some())
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchIndexError> {
        let mut indexes = self.indexes.lock().await;
        if indexes.contains_key(&schema.name) {
            return Err(SearchIndexError::schema(format!(
                "index '{}' already exists",
                schema.name
            )));
        }
        indexes.insert(schema.name.clone(), StoredIndex::new(schema.clone()));
        Ok(())
    }

    async fn bulk(
        &self,
        index: &str,
        batch: &IndexBatch,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let mut indexes = self.indexes.lock().await;
        let stored = indexes
            .get_mut(index)
            .ok_or_else(|| SearchIndexError::index_not_found(index))?;

        let mut results = Vec::with_capacity(batch.len());
        for action in &batch.actions {
            let key = action.key();
            if let IndexAction::Create(_) = action {
                if stored.contains(key) {
                    results.push(BatchOperationResult::failed(
                        key,
                        Some(409),
                        SearchIndexError::index(format!("document '{}' already exists", key)),
                    ));
                    continue;
                }
            }
            stored.pending.push(action.clone());
            results.push(BatchOperationResult::succeeded(key, Some(200)));
        }

        if self.visibility_lag == 0 {
            stored.publish();
        } else {
            stored.polls_until_visible = self.visibility_lag;
        }

        debug!(index = %index, actions = batch.len(), "Applied in-memory batch");
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn search_page(
        &self,
        index: &str,
        query: &SearchQuery,
        skip: usize,
        take: usize,
    ) -> Result<SearchPage, SearchIndexError> {
        let indexes = self.indexes.lock().await;
        let stored = indexes
            .get(index)
            .ok_or_else(|| SearchIndexError::index_not_found(index))?;

        let terms = tokenize(&query.text);
        let searchable = stored.schema.searchable_fields();

        let mut hits: Vec<(f64, usize, &Document)> = Vec::new();
        for (position, doc) in stored.visible.iter().enumerate() {
            if let Some(filter) = &query.filter {
                if !matches_filter(doc, filter) {
                    continue;
                }
            }
            let score = if terms.is_empty() {
                1.0
            } else {
                score_document(doc, &searchable, &terms)
            };
            if score > 0.0 {
                hits.push((score, position, doc));
            }
        }

        if query.order_by.is_empty() {
            hits.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        } else {
            hits.sort_by(|a, b| {
                let mut ordering = std::cmp::Ordering::Equal;
                for order in &query.order_by {
                    let left = a.2.field(&order.field).unwrap_or_default();
                    let right = b.2.field(&order.field).unwrap_or_default();
                    ordering = if order.descending {
                        right.cmp(left)
                    } else {
                        left.cmp(right)
                    };
                    if ordering.is_ne() {
                        break;
                    }
                }
                ordering.then(a.1.cmp(&b.1))
            });
        }

        let total = hits.len() as u64;
        let documents = hits
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(_, _, doc)| doc.clone())
            .collect();

        Ok(SearchPage {
            documents,
            total: Some(total),
        })
    }

    async fn document_count(&self, index: &str) -> Result<u64, SearchIndexError> {
        let mut indexes = self.indexes.lock().await;
        let stored = indexes
            .get_mut(index)
            .ok_or_else(|| SearchIndexError::index_not_found(index))?;

        if !stored.pending.is_empty() {
            if stored.polls_until_visible == 0 {
                stored.publish();
            } else {
                stored.polls_until_visible -= 1;
            }
        }
        Ok(stored.visible.len() as u64)
    }
}

/// Lowercase alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Sum over searchable fields of the share of field tokens that match a query term.
fn score_document(doc: &Document, searchable: &[&str], terms: &[String]) -> f64 {
    searchable
        .iter()
        .filter_map(|field| doc.field(field))
        .map(|value| {
            let tokens = tokenize(value);
            if tokens.is_empty() {
                return 0.0;
            }
            let matched = tokens.iter().filter(|t| terms.contains(t)).count();
            matched as f64 / tokens.len() as f64
        })
        .sum()
}

fn matches_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::Equals { field, value } => match (doc.field(field), value) {
            (Some(actual), Value::String(expected)) => actual == expected,
            (Some(actual), Value::Number(expected)) => actual
                .parse::<f64>()
                .is_ok_and(|actual| Some(actual) == expected.as_f64()),
            (Some(actual), Value::Bool(expected)) => actual.parse::<bool>() == Ok(*expected),
            _ => false,
        },
        Filter::And(filters) => filters.iter().all(|f| matches_filter(doc, f)),
        Filter::Or(filters) => filters.iter().any(|f| matches_filter(doc, f)),
        Filter::Not(filter) => !matches_filter(doc, filter),
    }
}
