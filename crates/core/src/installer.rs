use async_trait::async_trait;

/// Everything the installer needs to turn a chart into a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub chart_name: String,
    pub chart_version: String,
    /// Packaged chart archive as fetched from the repository.
    pub chart: Vec<u8>,
    pub namespace: String,
    /// Value overrides, rendered as YAML.
    pub values: String,
    /// Reuse the release name if one is already designated.
    pub reuse_name: bool,
    /// Skip post-install hooks.
    pub disable_hooks: bool,
    /// Block until the release's resources are ready.
    pub wait: bool,
}

/// A release created by the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Remove the release record entirely instead of soft-deleting it.
    pub purge: bool,
    pub disable_hooks: bool,
}

impl DeleteOptions {
    /// Options used when deprovisioning: purge, and run teardown hooks.
    pub fn purge_with_hooks() -> Self {
        DeleteOptions {
            purge: true,
            disable_hooks: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstallerError {
    #[error("could not connect to the installer: {0}")]
    Unreachable(String),

    #[error("could not install {chart}: {message}")]
    Install { chart: String, message: String },

    #[error("could not delete release {release}: {message}")]
    Delete { release: String, message: String },
}

/// Renders and applies charts, and deletes releases.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, request: InstallRequest) -> Result<Release, InstallerError>;

    async fn delete_release(&self, name: &str, options: DeleteOptions)
        -> Result<(), InstallerError>;
}
