//! Chart repository abstraction and the repository index format.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One published version of a chart, as listed in a repository index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    pub name: String,
    /// Chart (packaging) version; expected to be semver.
    ///
    /// Unquoted versions (`version: 1.10`) keep their text as written; they
    /// are never read through a number.
    pub version: String,
    /// Version of the packaged software. Plans are keyed by this.
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Download locations of the chart archive, absolute or relative to the index.
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A repository `index.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFile {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

impl IndexFile {
    pub fn from_yaml(source: &str) -> Result<Self, RepositoryError> {
        serde_yaml::from_str(source).map_err(|e| RepositoryError::Index(e.to_string()))
    }

    pub fn find(&self, name: &str, version: &str) -> Option<&ChartVersion> {
        self.entries
            .get(name)?
            .iter()
            .find(|cv| cv.version == version)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("chart {name}@{version} not found in repository")]
    ChartNotFound { name: String, version: String },

    /// The repository could not be reached or a download failed.
    #[error("repository fetch failed: {0}")]
    Fetch(String),

    /// The repository index could not be parsed.
    #[error("invalid repository index: {0}")]
    Index(String),
}

/// Source of chart metadata and chart archives.
#[async_trait]
pub trait ChartRepository: Send + Sync {
    /// Prepare the repository (e.g. download its index). Called once at startup.
    async fn init(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    /// Every chart version the repository offers, grouped by chart name.
    async fn list_charts(&self) -> Result<BTreeMap<String, Vec<ChartVersion>>, RepositoryError>;

    /// The packaged chart archive for `name@version`.
    async fn fetch_chart(&self, name: &str, version: &str) -> Result<Vec<u8>, RepositoryError>;
}
