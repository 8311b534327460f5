use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{InstanceRecord, RecordPatch};

/// The storage trait for instance records.
///
/// An `InstanceStore` keeps exactly one record per instance ID. It is both
/// the data store for an instance's lifecycle and the broker's only
/// concurrency control: `create` is an atomic "create if absent", so the
/// first provision request to reserve an ID wins and every other one gets
/// `StorageError::AlreadyExists`.
///
/// ## Merge semantics
///
/// `update` merges a [`RecordPatch`] into the stored record. Fields the
/// patch leaves as `Keep` are untouched; `Clear` removes the field. Callers
/// never read a record, change it locally and write it back; `update` is
/// the only read-modify-write path.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// with the background tasks that finish asynchronous operations.
#[async_trait]
pub trait InstanceStore: Send + Sync + 'static {
    /// Atomically create `record` iff no record exists for its instance ID.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if one already exists.
    async fn create(&self, record: InstanceRecord) -> Result<(), StorageError>;

    /// Read the record for `instance_id`.
    ///
    /// Returns `Err(StorageError::NotFound)` if it does not exist.
    async fn get(&self, instance_id: &str) -> Result<InstanceRecord, StorageError>;

    /// Merge `patch` into the existing record and return the result.
    ///
    /// Returns `Err(StorageError::NotFound)` if the record vanished, e.g.
    /// because a deprovision completed in the meantime.
    async fn update(
        &self,
        instance_id: &str,
        patch: RecordPatch,
    ) -> Result<InstanceRecord, StorageError>;

    /// Remove the record for `instance_id`.
    ///
    /// Returns `Err(StorageError::NotFound)` if it was already gone.
    async fn delete(&self, instance_id: &str) -> Result<(), StorageError>;
}
