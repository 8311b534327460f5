//! Cluster API abstraction: the objects the broker reads and labels, and the
//! client trait a Kubernetes (or fake) backend implements.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Label attached to every service/secret a release produced, naming the
/// owning instance.
pub const INSTANCE_LABEL: &str = "minibroker.instance";
/// Label the package manager puts on everything it installs.
pub const HERITAGE_LABEL: &str = "heritage";
/// Value of [`HERITAGE_LABEL`] for release-owned objects.
pub const RELEASE_HERITAGE: &str = "Tiller";
/// Label carrying the release name on release-owned objects.
pub const RELEASE_LABEL: &str = "release";

pub type Labels = BTreeMap<String, String>;

/// The kind of a namespaced object, used for error context and patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ConfigMap,
    Service,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ConfigMap => write!(f, "configmap"),
            ResourceKind::Service => write!(f, "service"),
            ResourceKind::Secret => write!(f, "secret"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: Labels,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectMeta {
            name: name.into(),
            namespace: namespace.into(),
            labels: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// A namespaced string key/value object. Instance records are persisted as these.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    #[serde(default)]
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Service {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

impl Service {
    /// In-cluster DNS name of the service.
    pub fn host(&self) -> String {
        format!("{}.{}.svc", self.metadata.name, self.metadata.namespace)
    }

    pub fn port_named(&self, name: &str) -> Option<&ServicePort> {
        self.ports.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ObjectMeta,
    /// Raw (already base64-decoded) secret values.
    #[serde(default)]
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Equality-based label selector (`k1=v1,k2=v2`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSelector(Labels);

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Selects objects produced by `release`.
    pub fn release(release: &str) -> Self {
        LabelSelector::new()
            .with(HERITAGE_LABEL, RELEASE_HERITAGE)
            .with(RELEASE_LABEL, release)
    }

    /// Selects objects associated with `instance_id`.
    pub fn instance(instance_id: &str) -> Self {
        LabelSelector::new().with(INSTANCE_LABEL, instance_id)
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&parts.join(","))
    }
}

/// Errors returned by a [`ClusterClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    /// Any other API server failure (connection, authorization, validation).
    #[error("cluster API error: {0}")]
    Api(String),
}

/// The subset of the cluster API the broker needs.
///
/// Implementations wrap a real API client; tests use an in-memory fake.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError>;

    /// Create a config map. Returns `ClusterError::AlreadyExists` if one with
    /// the same namespace/name exists; never overwrites.
    async fn create_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap, ClusterError>;

    /// Replace an existing config map's labels and data.
    async fn update_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap, ClusterError>;

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn list_services(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Service>, ClusterError>;

    async fn list_secrets(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Secret>, ClusterError>;

    /// Merge `labels` into the object's labels. Every other field of the
    /// object, including labels not named here, is preserved.
    async fn patch_labels(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        labels: &Labels,
    ) -> Result<(), ClusterError>;
}
