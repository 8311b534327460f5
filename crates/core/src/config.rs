//! Broker configuration.
//!
//! Everything the broker needs to know about its environment is carried in
//! [`BrokerConfig`] and handed to the broker at construction. Flags and
//! environment variables are bound at the process edge; the names live here
//! so every front end uses the same ones. Discovery returns [`ConfigError`]
//! instead of aborting the process.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Where a pod finds the namespace it runs in.
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Chart repository used when none is configured.
pub const DEFAULT_REPOSITORY_URL: &str = "https://charts.helm.sh/stable";

pub const ENV_NAMESPACE: &str = "MINIBROKER_NAMESPACE";
pub const ENV_REPOSITORY_URL: &str = "MINIBROKER_REPOSITORY_URL";
pub const ENV_CATALOG_ENABLED_ONLY: &str = "MINIBROKER_CATALOG_ENABLED_ONLY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read namespace from {path}: {source}")]
    NamespaceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("namespace file {path} is empty")]
    NamespaceEmpty { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("broker is missing its {0}")]
    MissingCollaborator(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerConfig {
    /// Namespace holding the broker's instance records.
    pub namespace: String,
    pub repository_url: String,
    /// Only list charts that have a registered credential provider.
    pub catalog_enabled_only: bool,
}

impl BrokerConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        BrokerConfig {
            namespace: namespace.into(),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            catalog_enabled_only: false,
        }
    }

    pub fn with_repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }

    pub fn with_catalog_enabled_only(mut self, enabled_only: bool) -> Self {
        self.catalog_enabled_only = enabled_only;
        self
    }

    /// Read the namespace from a service-account namespace file.
    pub fn discover_namespace(path: &Path) -> Result<String, ConfigError> {
        let raw =
            std::fs::read_to_string(path).map_err(|source| ConfigError::NamespaceUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        let namespace = raw.trim();
        if namespace.is_empty() {
            return Err(ConfigError::NamespaceEmpty {
                path: path.to_path_buf(),
            });
        }
        tracing::info!(namespace, "discovered broker namespace");
        Ok(namespace.to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".into()));
        }
        if self.repository_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "repository URL must not be empty".into(),
            ));
        }
        Ok(())
    }
}
