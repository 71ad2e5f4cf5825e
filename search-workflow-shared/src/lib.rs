//! # Search Workflow Shared
//!
//! Plain data types shared by the search workflow crates: the document model,
//! index schema definitions and search query parameters.

mod document;
mod query;
mod schema;

pub use document::Document;
pub use query::{Filter, OrderBy, SearchQuery, DEFAULT_PAGE_SIZE};
pub use schema::{FieldDefinition, FieldType, IndexSchema};
