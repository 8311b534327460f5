//! A chart repository read from a local `index.yaml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use minibroker_core::{ChartRepository, ChartVersion, IndexFile, RepositoryError};

/// Charts listed in an index file on disk. Chart archive URLs are resolved
/// relative to the index file's directory; remote URLs are not fetched.
pub(crate) struct LocalIndexRepository {
    base_dir: PathBuf,
    index: IndexFile,
}

impl LocalIndexRepository {
    pub(crate) fn load(path: &Path) -> Result<Self, RepositoryError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| RepositoryError::Fetch(format!("{}: {}", path.display(), e)))?;
        let index = IndexFile::from_yaml(&source)?;
        tracing::debug!(
            path = %path.display(),
            charts = index.entries.len(),
            "loaded repository index"
        );
        Ok(LocalIndexRepository {
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            index,
        })
    }
}

#[async_trait]
impl ChartRepository for LocalIndexRepository {
    async fn list_charts(&self) -> Result<BTreeMap<String, Vec<ChartVersion>>, RepositoryError> {
        Ok(self.index.entries.clone())
    }

    async fn fetch_chart(&self, name: &str, version: &str) -> Result<Vec<u8>, RepositoryError> {
        let chart = self
            .index
            .find(name, version)
            .ok_or_else(|| RepositoryError::ChartNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })?;
        let url = chart.urls.first().ok_or_else(|| {
            RepositoryError::Fetch(format!("{name}-{version} has no download URL"))
        })?;
        if url.contains("://") {
            return Err(RepositoryError::Fetch(format!(
                "{url}: only archives next to the index can be read"
            )));
        }

        let path = self.base_dir.join(url);
        tokio::fs::read(&path)
            .await
            .map_err(|e| RepositoryError::Fetch(format!("{}: {}", path.display(), e)))
    }
}
