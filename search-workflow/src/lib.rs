//! # Search Workflow
//!
//! Main library for the contents search workflow.
//!
//! This crate provides the configuration, dependency wiring and the
//! sequential workflow that rebuilds the contents index, loads the sample
//! documents and runs the sample queries.

pub mod config;
pub mod sample;
pub mod workflow;

pub use config::{ConsistencyWait, Dependencies, SchemaErrorPolicy, ServiceConfig, WorkflowConfig};
pub use workflow::{IndexWorkflow, QueryOutcome, WorkflowReport, WorkflowState};

use thiserror::Error;

/// Errors that can occur during workflow initialization or execution.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] search_workflow_repository::SearchIndexError),
}

impl WorkflowError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
