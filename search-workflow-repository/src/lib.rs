//! # Search Workflow Repository
//!
//! This crate provides the search index client used by the content workflow.
//! It includes definitions for errors, the provider interface, an in-memory
//! provider for tests and a concrete implementation for OpenSearch.

pub mod client;
pub mod config;
pub mod errors;
pub mod in_memory;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use client::{validate_schema, SearchIndexClient, SearchResults};
pub use config::{SearchIndexConfig, DEFAULT_MAX_BATCH_SIZE};
pub use errors::SearchIndexError;
pub use in_memory::InMemoryProvider;
pub use interfaces::SearchIndexProvider;
pub use opensearch::{OpenSearchClient, ServiceCredentials};
pub use types::{BatchOperationResult, BatchOperationSummary, IndexAction, IndexBatch, SearchPage};
