//! Dependency initialization and wiring for the search workflow.

use tracing::info;

use super::{ServiceConfig, WorkflowConfig};
use crate::WorkflowError;
use search_workflow_repository::{OpenSearchClient, SearchIndexClient, SearchIndexConfig};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Connected search index client.
    pub client: SearchIndexClient,
    /// Configuration the dependencies were built from.
    pub config: WorkflowConfig,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`WorkflowConfig::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(WorkflowError)` - If the configuration is invalid or the service
    ///   cannot be reached with the configured credential
    pub async fn new() -> Result<Self, WorkflowError> {
        let config = WorkflowConfig::from_env()?;
        Self::from_config(config).await
    }

    /// Initialize all dependencies from an explicit configuration.
    pub async fn from_config(config: WorkflowConfig) -> Result<Self, WorkflowError> {
        info!(
            url = %config.service.url,
            index = %config.index_name,
            policy = ?config.schema_error_policy,
            consistency = ?config.consistency,
            "Initializing dependencies"
        );

        let client = connect(&config.service, config.search_index_config()).await?;

        Ok(Self { client, config })
    }
}

/// Open a client to the search service and verify that it accepts the credential.
///
/// Fails with `AuthError` when the credential is rejected and with
/// `ConnectionError` when the URL is invalid or the service is unreachable.
pub async fn connect(
    service: &ServiceConfig,
    client_config: SearchIndexConfig,
) -> Result<SearchIndexClient, WorkflowError> {
    let provider = OpenSearchClient::new(&service.url, service.credentials.clone())?;
    let client = SearchIndexClient::connect(Box::new(provider), client_config).await?;

    info!(url = %service.url, "Search service connection verified");
    Ok(client)
}
