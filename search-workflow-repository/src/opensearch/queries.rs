//! OpenSearch query builders.
//!
//! This module builds search request bodies from a `SearchQuery` and the
//! schema of the index being searched.

use serde_json::{json, Value};

use crate::errors::SearchIndexError;
use crate::opensearch::index_config::exact_field;
use search_workflow_shared::{Filter, IndexSchema, SearchQuery};

/// Build the body of a search request.
///
/// The query builder handles:
/// - `simple_query_string` over the searchable fields with OR semantics
/// - `match_all` for an empty query text or `*`
/// - filter expressions compiled into `bool` filter clauses
/// - explicit sort on exact-match fields, with `_score` as the default
///
/// Paging is applied by the caller through `from` and `size`.
pub fn build_search_query(
    schema: &IndexSchema,
    query: &SearchQuery,
) -> Result<Value, SearchIndexError> {
    let text_query = build_text_query(schema, &query.text);

    let query_body = match &query.filter {
        Some(filter) => json!({
            "bool": {
                "must": [text_query],
                "filter": [build_filter(schema, filter)?]
            }
        }),
        None => text_query,
    };

    let mut body = json!({ "query": query_body });
    if !query.order_by.is_empty() {
        body["sort"] = build_sort(schema, query)?;
    }
    Ok(body)
}

/// Build the free-text part of the query.
fn build_text_query(schema: &IndexSchema, text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() || text == "*" {
        return json!({ "match_all": {} });
    }

    json!({
        "simple_query_string": {
            "query": text,
            "fields": schema.searchable_fields(),
            "default_operator": "or"
        }
    })
}

/// Compile a filter expression into an OpenSearch query clause.
///
/// Every referenced field must exist and be filterable (or be the key).
fn build_filter(schema: &IndexSchema, filter: &Filter) -> Result<Value, SearchIndexError> {
    match filter {
        Filter::Equals { field, value } => {
            let definition = schema.field(field).ok_or_else(|| {
                SearchIndexError::query(format!("unknown filter field '{}'", field))
            })?;
            if !definition.filterable && !definition.key {
                return Err(SearchIndexError::query(format!(
                    "field '{}' is not filterable",
                    field
                )));
            }
            let target = exact_field(definition);
            Ok(json!({ "term": { target: value } }))
        }
        Filter::And(filters) => {
            let clauses = filters
                .iter()
                .map(|f| build_filter(schema, f))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({ "bool": { "filter": clauses } }))
        }
        Filter::Or(filters) => {
            let clauses = filters
                .iter()
                .map(|f| build_filter(schema, f))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({ "bool": { "should": clauses, "minimum_should_match": 1 } }))
        }
        Filter::Not(filter) => Ok(json!({
            "bool": { "must_not": [build_filter(schema, filter)?] }
        })),
    }
}

/// Build the sort clause. Every ordered field must be sortable.
fn build_sort(schema: &IndexSchema, query: &SearchQuery) -> Result<Value, SearchIndexError> {
    let mut sort = Vec::with_capacity(query.order_by.len() + 1);
    for order in &query.order_by {
        let definition = schema.field(&order.field).ok_or_else(|| {
            SearchIndexError::query(format!("unknown sort field '{}'", order.field))
        })?;
        if !definition.sortable {
            return Err(SearchIndexError::query(format!(
                "field '{}' is not sortable",
                order.field
            )));
        }
        let target = exact_field(definition);
        let direction = if order.descending { "desc" } else { "asc" };
        sort.push(json!({ target: { "order": direction } }));
    }
    // Ties fall back to relevance.
    sort.push(json!("_score"));
    Ok(Value::Array(sort))
}
