//! Resource association: tagging release-owned services and secrets with the
//! instance that owns them, so binding can find them again later.

use std::sync::Arc;

use crate::cluster::{
    ClusterClient, ClusterError, LabelSelector, Labels, ResourceKind, Secret, Service,
    INSTANCE_LABEL,
};

/// The services and secrets belonging to one release or instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    pub services: Vec<Service>,
    pub secrets: Vec<Secret>,
}

impl Resources {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.secrets.is_empty()
    }
}

#[derive(Clone)]
pub struct ResourceAssociation {
    cluster: Arc<dyn ClusterClient>,
}

impl ResourceAssociation {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        ResourceAssociation { cluster }
    }

    /// Objects produced by `release`, found by the package manager's own
    /// labels. Used right after installation, before any instance label exists.
    pub async fn find_by_release(
        &self,
        release: &str,
        namespace: &str,
    ) -> Result<Resources, ClusterError> {
        self.find(namespace, &LabelSelector::release(release)).await
    }

    /// Objects labelled as belonging to `instance_id`.
    pub async fn find_by_instance(
        &self,
        instance_id: &str,
        namespace: &str,
    ) -> Result<Resources, ClusterError> {
        self.find(namespace, &LabelSelector::instance(instance_id))
            .await
    }

    async fn find(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Resources, ClusterError> {
        let services = self.cluster.list_services(namespace, selector).await?;
        let secrets = self.cluster.list_secrets(namespace, selector).await?;
        Ok(Resources { services, secrets })
    }

    /// Label every service and secret in `resources` with `instance_id`.
    ///
    /// Only the instance label is merged in; objects that already carry it
    /// are left alone. Returns the number of objects patched.
    pub async fn associate(
        &self,
        resources: &Resources,
        instance_id: &str,
    ) -> Result<usize, ClusterError> {
        let mut labels = Labels::new();
        labels.insert(INSTANCE_LABEL.to_string(), instance_id.to_string());

        let targets = resources
            .services
            .iter()
            .map(|s| (ResourceKind::Service, &s.metadata))
            .chain(
                resources
                    .secrets
                    .iter()
                    .map(|s| (ResourceKind::Secret, &s.metadata)),
            );

        let mut patched = 0;
        for (kind, meta) in targets {
            if meta.labels.get(INSTANCE_LABEL).map(String::as_str) == Some(instance_id) {
                continue;
            }
            tracing::debug!(%kind, namespace = %meta.namespace, name = %meta.name, instance_id, "labelling");
            self.cluster
                .patch_labels(kind, &meta.namespace, &meta.name, &labels)
                .await?;
            patched += 1;
        }
        Ok(patched)
    }
}
