use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{InstanceRecord, RecordPatch};
use crate::traits::InstanceStore;

/// Process-local `InstanceStore`, for tests and single-replica setups.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    records: RwLock<HashMap<String, InstanceRecord>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn create(&self, record: InstanceRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.instance_id) {
            return Err(StorageError::AlreadyExists {
                instance_id: record.instance_id,
            });
        }
        records.insert(record.instance_id.clone(), record);
        Ok(())
    }

    async fn get(&self, instance_id: &str) -> Result<InstanceRecord, StorageError> {
        self.records
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                instance_id: instance_id.to_string(),
            })
    }

    async fn update(
        &self,
        instance_id: &str,
        patch: RecordPatch,
    ) -> Result<InstanceRecord, StorageError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(instance_id)
            .ok_or_else(|| StorageError::NotFound {
                instance_id: instance_id.to_string(),
            })?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn delete(&self, instance_id: &str) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .remove(instance_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                instance_id: instance_id.to_string(),
            })
    }
}
