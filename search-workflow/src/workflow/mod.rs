//! The sequential index workflow.
//!
//! Rebuilds the index, loads the sample documents, waits for them to become
//! searchable and runs the sample queries, printing each matching title.

use futures::TryStreamExt;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::config::{ConsistencyWait, SchemaErrorPolicy, WorkflowConfig};
use crate::sample::{contents_schema, sample_documents, SAMPLE_QUERIES};
use crate::WorkflowError;
use search_workflow_repository::{
    BatchOperationSummary, IndexBatch, SearchIndexClient, SearchIndexError,
};
use search_workflow_shared::SearchQuery;

/// Progress of a workflow run. Steps only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    IndexDeleted,
    IndexCreated,
    DataLoaded,
    Queried,
    Done,
}

/// Titles returned for one query, in result order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub text: String,
    pub titles: Vec<String>,
}

/// What a workflow run did.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    /// Whether an existing index was removed.
    pub index_deleted: bool,
    /// Whether the index was created. False only under `SchemaErrorPolicy::Continue`.
    pub index_created: bool,
    /// Upload summary, absent when loading was skipped.
    pub upload: Option<BatchOperationSummary>,
    /// Whether every uploaded document was seen by the consistency wait.
    pub consistency_reached: bool,
    pub queries: Vec<QueryOutcome>,
    pub state: WorkflowState,
}

/// Runs the contents scenario against a connected client.
pub struct IndexWorkflow {
    client: SearchIndexClient,
    config: WorkflowConfig,
    state: WorkflowState,
}

impl IndexWorkflow {
    pub fn new(client: SearchIndexClient, config: WorkflowConfig) -> Self {
        Self {
            client,
            config,
            state: WorkflowState::Start,
        }
    }

    /// Current state; `Done` after a successful run.
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Run every step once, in order.
    ///
    /// Each run starts from scratch: the index is deleted and recreated, so
    /// repeated runs end with the same document set.
    pub async fn run(&mut self) -> Result<WorkflowReport, WorkflowError> {
        self.state = WorkflowState::Start;
        let index = self.config.index_name.clone();

        let index_deleted = self.client.delete_index_if_exists(&index).await?;
        self.advance(WorkflowState::IndexDeleted);

        let index_created = self.create_index(&index).await?;

        let mut upload = None;
        let mut consistency_reached = false;
        if index_created {
            self.advance(WorkflowState::IndexCreated);

            let batch = IndexBatch::upload(sample_documents());
            let summary = self.client.upload_documents(&index, &batch).await?;
            info!(
                index = %index,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Uploaded sample documents"
            );
            self.advance(WorkflowState::DataLoaded);

            consistency_reached = self
                .wait_for_consistency(&index, summary.succeeded as u64)
                .await?;
            upload = Some(summary);
        } else {
            warn!(index = %index, "Skipping data load, no index to load into");
        }

        let mut queries = Vec::with_capacity(SAMPLE_QUERIES.len());
        for text in SAMPLE_QUERIES {
            queries.push(self.query(&index, text).await?);
        }
        self.advance(WorkflowState::Queried);

        self.advance(WorkflowState::Done);
        Ok(WorkflowReport {
            index_deleted,
            index_created,
            upload,
            consistency_reached,
            queries,
            state: self.state,
        })
    }

    fn advance(&mut self, next: WorkflowState) {
        info!(from = ?self.state, to = ?next, "Workflow step completed");
        self.state = next;
    }

    /// Create the index, applying the schema error policy.
    async fn create_index(&self, index: &str) -> Result<bool, WorkflowError> {
        match self.client.create_index(&contents_schema(index)).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => match self.config.schema_error_policy {
                SchemaErrorPolicy::Abort => Err(e.into()),
                SchemaErrorPolicy::Continue => {
                    error!(index = %index, error = %e, "Failed to create index, continuing");
                    Ok(false)
                }
            },
        }
    }

    /// Wait until `expected` documents are searchable.
    ///
    /// Returns false when polling gave up; the queries still run.
    async fn wait_for_consistency(
        &self,
        index: &str,
        expected: u64,
    ) -> Result<bool, WorkflowError> {
        match self.config.consistency {
            ConsistencyWait::FixedDelay(delay) => {
                info!(
                    delay_ms = delay.as_millis() as u64,
                    "Waiting for documents to become searchable"
                );
                sleep(delay).await;
                Ok(true)
            }
            ConsistencyWait::Poll { interval, timeout } => {
                let deadline = Instant::now() + timeout;
                loop {
                    let visible = self.client.document_count(index).await?;
                    if visible >= expected {
                        info!(index = %index, visible, "Documents are searchable");
                        return Ok(true);
                    }
                    if Instant::now() >= deadline {
                        warn!(
                            index = %index,
                            visible,
                            expected,
                            timeout_ms = timeout.as_millis() as u64,
                            "Documents not yet searchable, querying anyway"
                        );
                        return Ok(false);
                    }
                    sleep(interval).await;
                }
            }
        }
    }

    /// Run one query and print the title of every result.
    ///
    /// A missing index counts as no results.
    async fn query(&self, index: &str, text: &str) -> Result<QueryOutcome, WorkflowError> {
        let mut results = self.client.search(index, SearchQuery::new(text));
        let mut titles = Vec::new();

        loop {
            match results.try_next().await {
                Ok(Some(document)) => {
                    println!("{}", document.title);
                    titles.push(document.title);
                }
                Ok(None) => break,
                Err(SearchIndexError::IndexNotFound(_)) => {
                    warn!(index = %index, query = %text, "Index not found, no results");
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(query = %text, results = titles.len(), "Query completed");
        Ok(QueryOutcome {
            text: text.to_string(),
            titles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use search_workflow_repository::{
        InMemoryProvider, SearchIndexConfig, SearchIndexProvider, SearchPage,
    };
    use search_workflow_shared::IndexSchema;
    use std::time::Duration;

    fn config(consistency: ConsistencyWait, policy: SchemaErrorPolicy) -> WorkflowConfig {
        WorkflowConfig {
            consistency,
            schema_error_policy: policy,
            ..WorkflowConfig::default()
        }
    }

    fn poll(interval_ms: u64, timeout_ms: u64) -> ConsistencyWait {
        ConsistencyWait::Poll {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn workflow(
        provider: impl SearchIndexProvider + 'static,
        config: WorkflowConfig,
    ) -> IndexWorkflow {
        let client =
            SearchIndexClient::with_config(Box::new(provider), SearchIndexConfig::default());
        IndexWorkflow::new(client, config)
    }

    fn titles(report: &WorkflowReport) -> Vec<Vec<&str>> {
        report
            .queries
            .iter()
            .map(|q| q.titles.iter().map(String::as_str).collect())
            .collect()
    }

    /// Fails every index creation with `error`; everything else goes to the in-memory backend.
    struct RejectingProvider {
        inner: InMemoryProvider,
        error: SearchIndexError,
    }

    impl RejectingProvider {
        fn new(error: SearchIndexError) -> Self {
            Self {
                inner: InMemoryProvider::new(),
                error,
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for RejectingProvider {
        async fn ping(&self) -> Result<(), SearchIndexError> {
            self.inner.ping().await
        }

        async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
            self.inner.index_exists(index).await
        }

        async fn delete_index(&self, index: &str) -> Result<bool, SearchIndexError> {
            self.inner.delete_index(index).await
        }

        async fn create_index(&self, _schema: &IndexSchema) -> Result<(), SearchIndexError> {
            Err(self.error.clone())
        }

        async fn bulk(
            &self,
            index: &str,
            batch: &IndexBatch,
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            self.inner.bulk(index, batch).await
        }

        async fn search_page(
            &self,
            index: &str,
            query: &SearchQuery,
            skip: usize,
            take: usize,
        ) -> Result<SearchPage, SearchIndexError> {
            self.inner.search_page(index, query, skip, take).await
        }

        async fn document_count(&self, index: &str) -> Result<u64, SearchIndexError> {
            self.inner.document_count(index).await
        }
    }

    #[tokio::test]
    async fn test_run_sample_scenario() {
        let mut workflow = workflow(
            InMemoryProvider::new(),
            config(poll(10, 1000), SchemaErrorPolicy::Abort),
        );

        let report = workflow.run().await.unwrap();

        assert!(!report.index_deleted);
        assert!(report.index_created);
        assert!(report.consistency_reached);
        let upload = report.upload.as_ref().unwrap();
        assert_eq!(upload.total, 3);
        assert_eq!(upload.succeeded, 3);
        assert_eq!(report.queries[0].text, "Khan");
        assert_eq!(report.queries[1].text, "JK");
        assert_eq!(
            titles(&report),
            vec![vec!["Mohsin Khan", "Mohsin Javed Khan"], vec!["Mohsin JK"]]
        );
        assert_eq!(report.state, WorkflowState::Done);
        assert_eq!(workflow.state(), WorkflowState::Done);
    }

    #[tokio::test]
    async fn test_run_twice_is_idempotent() {
        let mut workflow = workflow(
            InMemoryProvider::new(),
            config(poll(10, 1000), SchemaErrorPolicy::Abort),
        );

        let first = workflow.run().await.unwrap();
        let second = workflow.run().await.unwrap();

        assert!(!first.index_deleted);
        assert!(second.index_deleted);
        assert_eq!(first.queries, second.queries);
        assert_eq!(
            workflow.client.document_count("contents").await.unwrap(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_waits_for_visibility() {
        let mut workflow = workflow(
            InMemoryProvider::with_visibility_lag(3),
            config(poll(250, 10_000), SchemaErrorPolicy::Abort),
        );

        let report = workflow.run().await.unwrap();

        assert!(report.consistency_reached);
        assert_eq!(
            titles(&report),
            vec![vec!["Mohsin Khan", "Mohsin Javed Khan"], vec!["Mohsin JK"]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_is_not_fatal() {
        let mut workflow = workflow(
            InMemoryProvider::with_visibility_lag(100),
            config(poll(250, 1000), SchemaErrorPolicy::Abort),
        );

        let report = workflow.run().await.unwrap();

        assert!(!report.consistency_reached);
        assert_eq!(report.upload.as_ref().map(|u| u.succeeded), Some(3));
        assert!(report.queries.iter().all(|q| q.titles.is_empty()));
        assert_eq!(report.state, WorkflowState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay() {
        let mut workflow = workflow(
            InMemoryProvider::new(),
            config(
                ConsistencyWait::FixedDelay(Duration::from_millis(2000)),
                SchemaErrorPolicy::Abort,
            ),
        );

        let started = Instant::now();
        let report = workflow.run().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(report.consistency_reached);
        assert_eq!(report.queries[1].titles, vec!["Mohsin JK"]);
    }

    #[tokio::test]
    async fn test_schema_error_aborts_by_default() {
        let provider = RejectingProvider::new(SearchIndexError::schema(
            "status 400 Bad Request: invalid mapping for 'contents'",
        ));
        let mut workflow = workflow(provider, config(poll(10, 100), SchemaErrorPolicy::Abort));

        let result = workflow.run().await;

        assert!(matches!(
            result,
            Err(WorkflowError::SearchError(SearchIndexError::SchemaError(_)))
        ));
        assert_eq!(workflow.state(), WorkflowState::IndexDeleted);
    }

    #[tokio::test]
    async fn test_schema_error_continue_skips_loading() {
        let provider = RejectingProvider::new(SearchIndexError::schema(
            "status 400 Bad Request: invalid mapping for 'contents'",
        ));
        let mut workflow = workflow(provider, config(poll(10, 100), SchemaErrorPolicy::Continue));

        let report = workflow.run().await.unwrap();

        assert!(!report.index_created);
        assert!(report.upload.is_none());
        assert!(!report.consistency_reached);
        assert_eq!(report.queries.len(), 2);
        assert!(report.queries.iter().all(|q| q.titles.is_empty()));
        assert_eq!(report.state, WorkflowState::Done);
    }

    #[tokio::test]
    async fn test_auth_error_aborts_under_continue() {
        let provider = RejectingProvider::new(SearchIndexError::auth(
            "status 401 Unauthorized: missing authentication credentials",
        ));
        let mut workflow = workflow(provider, config(poll(10, 100), SchemaErrorPolicy::Continue));

        let result = workflow.run().await;

        assert!(matches!(
            result,
            Err(WorkflowError::SearchError(SearchIndexError::AuthError(_)))
        ));
        assert_eq!(workflow.state(), WorkflowState::IndexDeleted);
    }
}
