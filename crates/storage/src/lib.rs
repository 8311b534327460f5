mod error;
mod memory;
mod record;
mod traits;

pub mod conformance;

pub use error::StorageError;
pub use memory::MemoryInstanceStore;
pub use record::{
    keys, Field, InstanceRecord, OperationState, ProvisionParams, RecordPatch,
};
pub use traits::InstanceStore;
