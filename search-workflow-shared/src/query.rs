//! Search query parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of documents fetched per page when none is specified.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A structured filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// The field equals the given value exactly.
    Equals { field: String, value: Value },
    /// All sub-expressions match.
    And(Vec<Filter>),
    /// At least one sub-expression matches.
    Or(Vec<Filter>),
    /// The sub-expression does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Combine with another filter using AND.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            filter => Self::And(vec![filter, other]),
        }
    }

    /// Combine with another filter using OR.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            filter => Self::Or(vec![filter, other]),
        }
    }

    /// Negate this filter.
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Every field name referenced by this expression.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Equals { field, .. } => vec![field.as_str()],
            Self::And(filters) | Self::Or(filters) => {
                filters.iter().flat_map(|f| f.fields()).collect()
            }
            Self::Not(filter) => filter.fields(),
        }
    }
}

/// Sort order on a single sortable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// A free-text query with optional filter, ordering and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text search over the searchable fields.
    pub text: String,
    /// Optional structured filter.
    pub filter: Option<Filter>,
    /// Explicit ordering. Empty means relevance order.
    pub order_by: Vec<OrderBy>,
    /// Documents fetched per backend request.
    pub page_size: usize,
    /// Maximum number of documents to return overall.
    pub top: Option<usize>,
}

impl SearchQuery {
    /// Create a relevance-ordered text query.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filter: None,
            order_by: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            top: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new("Khan");

        assert_eq!(query.text, "Khan");
        assert!(query.filter.is_none());
        assert!(query.order_by.is_empty());
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
        assert!(query.top.is_none());
    }

    #[test]
    fn test_filter_and_flattens() {
        let filter = Filter::eq("body", "a")
            .and(Filter::eq("body", "b"))
            .and(Filter::eq("title", "c"));

        match &filter {
            Filter::And(filters) => assert_eq!(filters.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
        assert_eq!(filter.fields(), vec!["body", "body", "title"]);
    }

    #[test]
    fn test_filter_negate_fields() {
        let filter = Filter::eq("body", "a").or(Filter::eq("id", "1")).negate();
        assert_eq!(filter.fields(), vec!["body", "id"]);
    }
}
