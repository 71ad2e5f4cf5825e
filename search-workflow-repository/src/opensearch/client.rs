//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    http::StatusCode,
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetMappingParts,
    },
    BulkParts, CountParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, schema_from_mapping};
use crate::opensearch::queries::build_search_query;
use crate::types::{
    BatchOperationResult, BatchOperationSummary, IndexAction, IndexBatch, SearchPage,
};
use search_workflow_shared::{Document, IndexSchema, SearchQuery};

/// Credential presented to the search service.
#[derive(Clone, PartialEq, Eq)]
pub enum ServiceCredentials {
    /// No authentication.
    None,
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// API key authentication.
    ApiKey { id: String, key: String },
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::ApiKey { id, .. } => f
                .debug_struct("ApiKey")
                .field("id", id)
                .field("key", &"***")
                .finish(),
        }
    }
}

impl ServiceCredentials {
    fn into_transport_credentials(self) -> Option<Credentials> {
        match self {
            Self::None => None,
            Self::Basic { username, password } => Some(Credentials::Basic(username, password)),
            Self::ApiKey { id, key } => Some(Credentials::ApiKey(id, key)),
        }
    }
}

/// OpenSearch client implementation.
///
/// Provides index management, bulk writes and full-text search using OpenSearch
/// as the backend. Schemas are stored in the index mapping metadata and cached
/// here so searches can translate filters and sort fields.
///
/// # Example
///
/// ```ignore
/// let provider = OpenSearchClient::new("http://localhost:9200", ServiceCredentials::None)?;
/// let config = SearchIndexConfig::default();
/// let client = SearchIndexClient::connect(Box::new(provider), config).await?;
/// client.delete_index_if_exists("contents").await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    schemas: RwLock<HashMap<String, IndexSchema>>,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client for the specified URL.
    ///
    /// No request is sent; use `ping` to verify the connection.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `credentials` - Credential presented on every request
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or transport setup fails
    pub fn new(url: &str, credentials: ServiceCredentials) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(format!("{}: {}", url, e)))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool).disable_proxy();
        if let Some(credentials) = credentials.into_transport_credentials() {
            builder = builder.auth(credentials);
        }
        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch client");

        Ok(Self {
            client,
            schemas: RwLock::new(HashMap::new()),
        })
    }

    /// Find the schema of an index, reading it from the mapping metadata on a cache miss.
    async fn resolve_schema(&self, index: &str) -> Result<IndexSchema, SearchIndexError> {
        if let Some(schema) = self.schemas.read().await.get(index) {
            return Ok(schema.clone());
        }

        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchIndexError::index_not_found(index));
        }
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::query).await);
        }

        let mapping: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;
        let schema = schema_from_mapping(index, &mapping).ok_or_else(|| {
            SearchIndexError::query(format!("index '{}' has no schema metadata", index))
        })?;

        self.schemas
            .write()
            .await
            .insert(index.to_string(), schema.clone());
        Ok(schema)
    }
}

/// Default `index.max_result_window`; `from + size` beyond it is rejected by the service.
const MAX_RESULT_WINDOW: usize = 10_000;

/// Shrink a page so it stays inside the result window. Zero once the window is used up.
fn result_window_take(skip: usize, take: usize) -> usize {
    take.min(MAX_RESULT_WINDOW.saturating_sub(skip))
}

/// Map a transport failure (no HTTP response) onto a connection error.
fn transport_error(e: opensearch::Error) -> SearchIndexError {
    SearchIndexError::connection(e.to_string())
}

/// Build an error from a non-success response.
async fn status_error(
    status: StatusCode,
    response: Response,
    kind: fn(String) -> SearchIndexError,
) -> SearchIndexError {
    let error_body = response.text().await.unwrap_or_default();
    error!(status = %status, body = %error_body, "Request failed");

    map_status(status, &error_body, kind)
}

/// 401 and 403 always map to an authentication error; other statuses use `kind`.
fn map_status(
    status: StatusCode,
    body: &str,
    kind: fn(String) -> SearchIndexError,
) -> SearchIndexError {
    let message = format!("status {}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SearchIndexError::auth(message),
        _ => kind(message),
    }
}

/// Convert a bulk response into per-action results.
///
/// Items are matched to actions by position. A delete of a missing document
/// counts as a success.
fn parse_bulk_response(batch: &IndexBatch, body: &Value) -> BatchOperationSummary {
    let empty = Vec::new();
    let items = body
        .get("items")
        .and_then(|i| i.as_array())
        .unwrap_or(&empty);

    let results = batch
        .actions
        .iter()
        .enumerate()
        .map(|(position, action)| {
            let key = action.key();
            let Some(item) = items
                .get(position)
                .and_then(|item| item.as_object())
                .and_then(|item| item.values().next())
            else {
                return BatchOperationResult::failed(
                    key,
                    None,
                    SearchIndexError::index("no result returned for document"),
                );
            };

            let status = item
                .get("status")
                .and_then(|s| s.as_u64())
                .map(|s| s as u16);

            match item.get("error") {
                None => BatchOperationResult::succeeded(key, status),
                Some(_) if matches!(action, IndexAction::Delete { .. }) && status == Some(404) => {
                    BatchOperationResult::succeeded(key, status)
                }
                Some(error) => {
                    let reason = error
                        .get("reason")
                        .and_then(|r| r.as_str())
                        .map(String::from)
                        .unwrap_or_else(|| error.to_string());
                    BatchOperationResult::failed(key, status, SearchIndexError::index(reason))
                }
            }
        })
        .collect();

    BatchOperationSummary::from_results(results)
}

/// Build the newline-delimited body of a bulk request.
fn bulk_body(index: &str, batch: &IndexBatch) -> Result<Vec<JsonBody<Value>>, SearchIndexError> {
    let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(batch.len() * 2);

    for action in &batch.actions {
        let op = match action {
            IndexAction::Upload(_) => "index",
            IndexAction::Create(_) => "create",
            IndexAction::Delete { .. } => "delete",
        };
        body.push(json!({ op: { "_index": index, "_id": action.key() } }).into());

        if let Some(document) = action.document() {
            let source = serde_json::to_value(document)
                .map_err(|e| SearchIndexError::validation(e.to_string()))?;
            body.push(source.into());
        }
    }

    Ok(body)
}

/// Extract documents from a search response, skipping hits that do not parse.
fn parse_hits(body: &Value) -> SearchPage {
    let total = body
        .get("hits")
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value"))
        .and_then(|v| v.as_u64());

    let documents = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(|h| h.as_array())
        .map(|hits| hits.iter().filter_map(parse_hit).collect())
        .unwrap_or_default();

    SearchPage { documents, total }
}

fn parse_hit(hit: &Value) -> Option<Document> {
    let source = hit.get("_source")?;
    match serde_json::from_value(source.clone()) {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(
                error = %e,
                id = ?hit.get("_id"),
                "Skipping hit that does not match the document model"
            );
            None
        }
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self.client.ping().send().await.map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::connection).await);
        }

        info!("OpenSearch connection verified");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(status, response, SearchIndexError::unknown).await),
        }
    }

    /// Delete an index. A 404 means there was nothing to delete.
    #[instrument(skip(self))]
    async fn delete_index(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        self.schemas.write().await.remove(index);

        let status = response.status_code();

        // 404 is acceptable - index may not exist
        if status == StatusCode::NOT_FOUND {
            debug!(index = %index, "Index not found, nothing to delete");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::index).await);
        }

        debug!(index = %index, "Index deleted");
        Ok(true)
    }

    #[instrument(skip(self, schema), fields(index = %schema.name))]
    async fn create_index(&self, schema: &IndexSchema) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&schema.name))
            .body(get_index_settings(schema))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::schema).await);
        }

        self.schemas
            .write()
            .await
            .insert(schema.name.clone(), schema.clone());

        debug!(index = %schema.name, "Index created");
        Ok(())
    }

    /// Send all actions in a single `_bulk` request and report each item.
    #[instrument(skip(self, batch), fields(actions = batch.len()))]
    async fn bulk(
        &self,
        index: &str,
        batch: &IndexBatch,
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let body = bulk_body(index, batch)?;

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_operation(e.to_string()))?;

        let status = response.status_code();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchIndexError::index_not_found(index));
        }
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::bulk_operation).await);
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::bulk_operation(e.to_string()))?;

        let summary = parse_bulk_response(batch, &response_body);
        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );
        Ok(summary)
    }

    #[instrument(skip(self, query), fields(text = %query.text))]
    async fn search_page(
        &self,
        index: &str,
        query: &SearchQuery,
        skip: usize,
        take: usize,
    ) -> Result<SearchPage, SearchIndexError> {
        let take = result_window_take(skip, take);
        if take == 0 {
            debug!(index = %index, skip, "Result window exhausted");
            return Ok(SearchPage {
                documents: Vec::new(),
                total: None,
            });
        }

        let schema = self.resolve_schema(index).await?;
        let body = build_search_query(&schema, query)?;

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .from(skip as i64)
            .size(take as i64)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchIndexError::index_not_found(index));
        }
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::query).await);
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        Ok(parse_hits(&response_body))
    }

    #[instrument(skip(self))]
    async fn document_count(&self, index: &str) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status_code();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchIndexError::index_not_found(index));
        }
        if !status.is_success() {
            return Err(status_error(status, response, SearchIndexError::query).await);
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        response_body
            .get("count")
            .and_then(|c| c.as_u64())
            .ok_or_else(|| SearchIndexError::query("count missing from response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> IndexBatch {
        IndexBatch::upload(vec![
            Document::new("1", "Mohsin JK", "bla bla"),
            Document::new("2", "Mohsin Javed Khan", "bla bla"),
            Document::new("3", "Mohsin Khan", "bla bla"),
        ])
    }

    #[test]
    fn test_invalid_url() {
        let result = OpenSearchClient::new("not a url", ServiceCredentials::None);
        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }

    #[test]
    fn test_unauthorized_maps_to_auth_error() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let error = map_status(status, "security_exception", SearchIndexError::connection);
            assert!(matches!(error, SearchIndexError::AuthError(_)));
            assert!(error.to_string().contains("security_exception"));
        }
    }

    #[test]
    fn test_other_statuses_use_given_kind() {
        let error = map_status(
            StatusCode::BAD_REQUEST,
            "resource_already_exists_exception",
            SearchIndexError::schema,
        );
        assert!(matches!(error, SearchIndexError::SchemaError(_)));

        let error = map_status(StatusCode::SERVICE_UNAVAILABLE, "", SearchIndexError::connection);
        assert!(matches!(error, SearchIndexError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_ping_unreachable_service() {
        // Nothing listens on port 1.
        let client = OpenSearchClient::new("http://127.0.0.1:1", ServiceCredentials::None).unwrap();
        let result = client.ping().await;
        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }

    #[test]
    fn test_result_window_take() {
        assert_eq!(result_window_take(0, 50), 50);
        assert_eq!(result_window_take(9_980, 50), 20);
        assert_eq!(result_window_take(10_000, 50), 0);
        assert_eq!(result_window_take(12_000, 50), 0);
    }

    #[tokio::test]
    async fn test_search_past_result_window_is_empty() {
        let client = OpenSearchClient::new("http://127.0.0.1:1", ServiceCredentials::None).unwrap();
        let page = client
            .search_page("contents", &SearchQuery::new("Khan"), 10_000, 50)
            .await
            .unwrap();
        assert!(page.documents.is_empty());
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let credentials = ServiceCredentials::ApiKey {
            id: "workflow".to_string(),
            key: "secret-key".to_string(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("workflow"));
        assert!(!printed.contains("secret-key"));
    }

    #[test]
    fn test_parse_bulk_response_all_succeeded() {
        let body = json!({
            "errors": false,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 201 } },
                { "index": { "_id": "3", "status": 200 } }
            ]
        });

        let summary = parse_bulk_response(&sample_batch(), &body);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.results[2].status, Some(200));
    }

    #[test]
    fn test_parse_bulk_response_partial_failure() {
        let batch = IndexBatch::create(vec![
            Document::new("1", "Mohsin JK", "bla bla"),
            Document::new("2", "Mohsin Javed Khan", "bla bla"),
        ]);
        let body = json!({
            "errors": true,
            "items": [
                { "create": { "_id": "1", "status": 201 } },
                { "create": {
                    "_id": "2",
                    "status": 409,
                    "error": {
                        "type": "version_conflict_engine_exception",
                        "reason": "[2]: version conflict, document already exists"
                    }
                } }
            ]
        });

        let summary = parse_bulk_response(&batch, &body);

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed_keys(), vec!["2"]);
        assert_eq!(summary.results[1].status, Some(409));
        let error = summary.results[1].error.as_ref().unwrap();
        assert!(error.to_string().contains("document already exists"));
    }

    #[test]
    fn test_parse_bulk_response_missing_delete_is_success() {
        let batch = IndexBatch::delete(["9"]);
        let body = json!({
            "errors": false,
            "items": [
                { "delete": { "_id": "9", "status": 404, "result": "not_found" } }
            ]
        });

        let summary = parse_bulk_response(&batch, &body);
        assert_eq!(summary.succeeded, 1);
    }

    #[test]
    fn test_parse_bulk_response_missing_items() {
        let summary = parse_bulk_response(&sample_batch(), &json!({ "errors": true }));
        assert_eq!(summary.failed, 3);
    }

    #[test]
    fn test_bulk_body() {
        let mut batch = sample_batch();
        batch.push(IndexAction::Delete {
            key: "4".to_string(),
        });

        let body = bulk_body("contents", &batch).unwrap();

        // Three action/source pairs plus one delete line.
        assert_eq!(body.len(), 7);
    }

    #[test]
    fn test_parse_hits() {
        let body = json!({
            "hits": {
                "total": { "value": 2, "relation": "eq" },
                "hits": [
                    { "_id": "3", "_score": 0.9, "_source": { "id": "3", "title": "Mohsin Khan", "body": "bla bla" } },
                    { "_id": "2", "_score": 0.7, "_source": { "id": "2", "title": "Mohsin Javed Khan", "body": "bla bla" } }
                ]
            }
        });

        let page = parse_hits(&body);

        assert_eq!(page.total, Some(2));
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0].title, "Mohsin Khan");
        assert_eq!(page.documents[1].id, "2");
    }

    #[test]
    fn test_parse_hit_invalid() {
        let hit = json!({
            "_source": {
                "name": "Missing fields"
            },
            "_score": 1.0
        });

        assert!(parse_hit(&hit).is_none());
    }

    #[test]
    fn test_parse_hits_empty_response() {
        let page = parse_hits(&json!({}));
        assert!(page.documents.is_empty());
        assert!(page.total.is_none());
    }
}
