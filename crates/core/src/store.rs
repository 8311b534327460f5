//! `InstanceStore` backed by one config map per instance.

use std::sync::Arc;

use async_trait::async_trait;
use minibroker_storage::{keys, InstanceRecord, InstanceStore, RecordPatch, StorageError};

use crate::cluster::{ClusterClient, ClusterError, ConfigMap, ObjectMeta};

/// Persists each instance record as a config map named after the instance
/// ID in the broker's namespace. The cluster's create-if-absent semantics
/// provide the provisioning lock.
pub struct ConfigMapInstanceStore {
    cluster: Arc<dyn ClusterClient>,
    namespace: String,
}

impl ConfigMapInstanceStore {
    pub fn new(cluster: Arc<dyn ClusterClient>, namespace: impl Into<String>) -> Self {
        ConfigMapInstanceStore {
            cluster,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn fetch(&self, instance_id: &str) -> Result<ConfigMap, StorageError> {
        self.cluster
            .get_config_map(&self.namespace, instance_id)
            .await
            .map_err(|e| map_cluster_error(instance_id, e))
    }
}

fn map_cluster_error(instance_id: &str, err: ClusterError) -> StorageError {
    match err {
        ClusterError::NotFound { .. } => StorageError::NotFound {
            instance_id: instance_id.to_string(),
        },
        ClusterError::AlreadyExists { .. } => StorageError::AlreadyExists {
            instance_id: instance_id.to_string(),
        },
        ClusterError::Api(message) => StorageError::Backend(format!(
            "configmap {}: {}",
            instance_id, message
        )),
    }
}

#[async_trait]
impl InstanceStore for ConfigMapInstanceStore {
    async fn create(&self, record: InstanceRecord) -> Result<(), StorageError> {
        let metadata = ObjectMeta::new(&self.namespace, &record.instance_id)
            .with_label(keys::SERVICE_ID, &record.service_id)
            .with_label(keys::PLAN_ID, &record.plan_id);
        let config_map = ConfigMap {
            metadata,
            data: record.to_data()?,
        };

        self.cluster
            .create_config_map(config_map)
            .await
            .map(|_| ())
            .map_err(|e| map_cluster_error(&record.instance_id, e))
    }

    async fn get(&self, instance_id: &str) -> Result<InstanceRecord, StorageError> {
        let config_map = self.fetch(instance_id).await?;
        InstanceRecord::from_data(instance_id, &config_map.data)
    }

    async fn update(
        &self,
        instance_id: &str,
        patch: RecordPatch,
    ) -> Result<InstanceRecord, StorageError> {
        let mut config_map = self.fetch(instance_id).await?;
        let mut record = InstanceRecord::from_data(instance_id, &config_map.data)?;
        patch.apply(&mut record);
        config_map.data = record.to_data()?;

        self.cluster
            .update_config_map(config_map)
            .await
            .map_err(|e| map_cluster_error(instance_id, e))?;
        Ok(record)
    }

    async fn delete(&self, instance_id: &str) -> Result<(), StorageError> {
        self.cluster
            .delete_config_map(&self.namespace, instance_id)
            .await
            .map_err(|e| map_cluster_error(instance_id, e))
    }
}
