//! Workflow configuration.
//!
//! Settings are read from environment variables (after `.env` is loaded by the
//! binary). Parsing goes through a lookup function so it can be exercised
//! without touching the process environment.

mod dependencies;

pub use dependencies::{connect, Dependencies};

use std::env;
use std::time::Duration;

use search_workflow_repository::{SearchIndexConfig, ServiceCredentials, DEFAULT_MAX_BATCH_SIZE};

use crate::WorkflowError;

/// Default search service URL.
const DEFAULT_SERVICE_URL: &str = "http://localhost:9200";

/// Default index name.
const DEFAULT_INDEX_NAME: &str = "contents";

const DEFAULT_CONSISTENCY_DELAY_MS: u64 = 2000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 10_000;

/// What to do when the index cannot be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaErrorPolicy {
    /// Stop the workflow with the error.
    #[default]
    Abort,
    /// Log the error, skip loading and run the queries anyway.
    Continue,
}

/// How the workflow waits for uploaded documents to become searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyWait {
    /// Sleep for a fixed duration.
    FixedDelay(Duration),
    /// Poll the document count until it reaches the uploaded count or `timeout` passes.
    Poll { interval: Duration, timeout: Duration },
}

impl Default for ConsistencyWait {
    fn default() -> Self {
        Self::Poll {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
        }
    }
}

/// Where the search service lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub url: String,
    pub credentials: ServiceCredentials,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.to_string(),
            credentials: ServiceCredentials::None,
        }
    }
}

/// Complete workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub service: ServiceConfig,
    pub index_name: String,
    pub schema_error_policy: SchemaErrorPolicy,
    pub consistency: ConsistencyWait,
    pub max_batch_size: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            schema_error_policy: SchemaErrorPolicy::default(),
            consistency: ConsistencyWait::default(),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl WorkflowConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_SERVICE_URL`: service URL (default: http://localhost:9200)
    /// - `SEARCH_SERVICE_API_KEY`: API key in `id:key` form
    /// - `SEARCH_SERVICE_USERNAME` / `SEARCH_SERVICE_PASSWORD`: basic auth, used when no
    ///   API key is set
    /// - `SEARCH_INDEX_NAME`: index name (default: contents)
    /// - `SEARCH_SCHEMA_ERROR_POLICY`: `abort` or `continue` (default: abort)
    /// - `SEARCH_CONSISTENCY_MODE`: `poll` or `fixed` (default: poll)
    /// - `SEARCH_CONSISTENCY_DELAY_MS`: fixed delay (default: 2000)
    /// - `SEARCH_POLL_INTERVAL_MS`: poll interval (default: 250)
    /// - `SEARCH_POLL_TIMEOUT_MS`: poll budget (default: 10000)
    /// - `SEARCH_MAX_BATCH_SIZE`: client-side batch limit (default: 1000)
    pub fn from_env() -> Result<Self, WorkflowError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Unset and empty variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let url = var("SEARCH_SERVICE_URL").unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        let credentials = parse_credentials(
            var("SEARCH_SERVICE_API_KEY"),
            var("SEARCH_SERVICE_USERNAME"),
            var("SEARCH_SERVICE_PASSWORD"),
        )?;

        let index_name = var("SEARCH_INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());

        let schema_error_policy = match var("SEARCH_SCHEMA_ERROR_POLICY") {
            None => SchemaErrorPolicy::default(),
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "abort" => SchemaErrorPolicy::Abort,
                "continue" => SchemaErrorPolicy::Continue,
                other => {
                    return Err(WorkflowError::config(format!(
                        "SEARCH_SCHEMA_ERROR_POLICY must be 'abort' or 'continue', got '{}'",
                        other
                    )))
                }
            },
        };

        let consistency = match var("SEARCH_CONSISTENCY_MODE")
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("poll") => ConsistencyWait::Poll {
                interval: millis(
                    var("SEARCH_POLL_INTERVAL_MS"),
                    "SEARCH_POLL_INTERVAL_MS",
                    DEFAULT_POLL_INTERVAL_MS,
                )?,
                timeout: millis(
                    var("SEARCH_POLL_TIMEOUT_MS"),
                    "SEARCH_POLL_TIMEOUT_MS",
                    DEFAULT_POLL_TIMEOUT_MS,
                )?,
            },
            Some("fixed") => ConsistencyWait::FixedDelay(millis(
                var("SEARCH_CONSISTENCY_DELAY_MS"),
                "SEARCH_CONSISTENCY_DELAY_MS",
                DEFAULT_CONSISTENCY_DELAY_MS,
            )?),
            Some(other) => {
                return Err(WorkflowError::config(format!(
                    "SEARCH_CONSISTENCY_MODE must be 'poll' or 'fixed', got '{}'",
                    other
                )))
            }
        };

        if let ConsistencyWait::Poll { interval, .. } = consistency {
            if interval.is_zero() {
                return Err(WorkflowError::config(
                    "SEARCH_POLL_INTERVAL_MS must be greater than zero",
                ));
            }
        }

        let max_batch_size = match var("SEARCH_MAX_BATCH_SIZE") {
            None => DEFAULT_MAX_BATCH_SIZE,
            Some(value) => match value.trim().parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(WorkflowError::config(format!(
                        "SEARCH_MAX_BATCH_SIZE must be a positive integer, got '{}'",
                        value
                    )))
                }
                Ok(size) => size,
            },
        };

        Ok(Self {
            service: ServiceConfig { url, credentials },
            index_name,
            schema_error_policy,
            consistency,
            max_batch_size,
        })
    }

    /// Client-side limits for the search index client.
    pub fn search_index_config(&self) -> SearchIndexConfig {
        SearchIndexConfig::with_max_batch_size(self.max_batch_size)
    }
}

/// Pick the credential: an API key wins over basic auth.
fn parse_credentials(
    api_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<ServiceCredentials, WorkflowError> {
    if let Some(api_key) = api_key {
        let (id, key) = api_key
            .trim()
            .split_once(':')
            .filter(|(id, key)| !id.is_empty() && !key.is_empty())
            .ok_or_else(|| {
                WorkflowError::config("SEARCH_SERVICE_API_KEY must have the form 'id:key'")
            })?;
        return Ok(ServiceCredentials::ApiKey {
            id: id.to_string(),
            key: key.to_string(),
        });
    }

    match (username, password) {
        (Some(username), Some(password)) => Ok(ServiceCredentials::Basic { username, password }),
        (None, None) => Ok(ServiceCredentials::None),
        (Some(_), None) => Err(WorkflowError::config(
            "SEARCH_SERVICE_PASSWORD is required with SEARCH_SERVICE_USERNAME",
        )),
        (None, Some(_)) => Err(WorkflowError::config(
            "SEARCH_SERVICE_USERNAME is required with SEARCH_SERVICE_PASSWORD",
        )),
    }
}

fn millis(value: Option<String>, name: &str, default: u64) -> Result<Duration, WorkflowError> {
    match value {
        None => Ok(Duration::from_millis(default)),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| {
                WorkflowError::config(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    name, value
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> Result<WorkflowConfig, WorkflowError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkflowConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, WorkflowConfig::default());
        assert_eq!(config.service.url, "http://localhost:9200");
        assert_eq!(config.index_name, "contents");
        assert_eq!(config.schema_error_policy, SchemaErrorPolicy::Abort);
        assert_eq!(
            config.consistency,
            ConsistencyWait::Poll {
                interval: Duration::from_millis(250),
                timeout: Duration::from_secs(10),
            }
        );
        assert_eq!(config.max_batch_size, 1000);
    }

    #[test]
    fn test_api_key_wins_over_basic_auth() {
        let config = parse(&[
            ("SEARCH_SERVICE_API_KEY", "workflow:s3cret"),
            ("SEARCH_SERVICE_USERNAME", "admin"),
            ("SEARCH_SERVICE_PASSWORD", "admin"),
        ])
        .unwrap();

        assert_eq!(
            config.service.credentials,
            ServiceCredentials::ApiKey {
                id: "workflow".to_string(),
                key: "s3cret".to_string(),
            }
        );
    }

    #[test]
    fn test_basic_auth() {
        let config = parse(&[
            ("SEARCH_SERVICE_URL", "https://search.example.com:9200"),
            ("SEARCH_SERVICE_USERNAME", "admin"),
            ("SEARCH_SERVICE_PASSWORD", "admin"),
        ])
        .unwrap();

        assert_eq!(config.service.url, "https://search.example.com:9200");
        assert_eq!(
            config.service.credentials,
            ServiceCredentials::Basic {
                username: "admin".to_string(),
                password: "admin".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_credentials() {
        assert!(matches!(
            parse(&[("SEARCH_SERVICE_API_KEY", "no-separator")]),
            Err(WorkflowError::ConfigError(_))
        ));
        assert!(matches!(
            parse(&[("SEARCH_SERVICE_API_KEY", ":key")]),
            Err(WorkflowError::ConfigError(_))
        ));
        assert!(matches!(
            parse(&[("SEARCH_SERVICE_USERNAME", "admin")]),
            Err(WorkflowError::ConfigError(_))
        ));
    }

    #[test]
    fn test_fixed_delay_and_continue_policy() {
        let config = parse(&[
            ("SEARCH_CONSISTENCY_MODE", "FIXED"),
            ("SEARCH_CONSISTENCY_DELAY_MS", "500"),
            ("SEARCH_SCHEMA_ERROR_POLICY", "continue"),
            ("SEARCH_INDEX_NAME", "contents-staging"),
        ])
        .unwrap();

        assert_eq!(
            config.consistency,
            ConsistencyWait::FixedDelay(Duration::from_millis(500))
        );
        assert_eq!(config.schema_error_policy, SchemaErrorPolicy::Continue);
        assert_eq!(config.index_name, "contents-staging");
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = parse(&[("SEARCH_INDEX_NAME", ""), ("SEARCH_MAX_BATCH_SIZE", " ")]).unwrap();
        assert_eq!(config.index_name, "contents");
        assert_eq!(config.max_batch_size, 1000);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [("SEARCH_SCHEMA_ERROR_POLICY", "retry")],
            [("SEARCH_CONSISTENCY_MODE", "sleep")],
            [("SEARCH_POLL_INTERVAL_MS", "fast")],
            [("SEARCH_POLL_INTERVAL_MS", "0")],
            [("SEARCH_MAX_BATCH_SIZE", "0")],
            [("SEARCH_MAX_BATCH_SIZE", "-5")],
        ] {
            let result = parse(&vars);
            assert!(
                matches!(result, Err(WorkflowError::ConfigError(_))),
                "expected a configuration error for {:?}",
                vars
            );
        }
    }

    #[test]
    fn test_search_index_config() {
        let config = parse(&[("SEARCH_MAX_BATCH_SIZE", "10")]).unwrap();
        assert_eq!(config.search_index_config().max_batch_size, Some(10));
    }
}
