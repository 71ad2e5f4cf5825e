//! OpenSearch implementation of the search index provider.
//!
//! This module provides a concrete implementation of `SearchIndexProvider`
//! using OpenSearch as the backend.

mod client;
mod index_config;
mod queries;

pub use client::{OpenSearchClient, ServiceCredentials};
pub use index_config::{exact_field, get_index_settings};
pub use queries::build_search_query;
