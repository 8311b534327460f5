//! Async operation tracking on top of the instance record.
//!
//! An operation is identified by a random token stored in the record. The
//! token survives the operation's completion so pollers can keep asking
//! about it; a record that disappears entirely means a deprovision finished.

use std::fmt;
use std::sync::Arc;

use minibroker_storage::{InstanceStore, OperationState, RecordPatch, StorageError};
use serde::Serialize;

use crate::error::BrokerError;

pub const PROVISION_PREFIX: &str = "provision-";
pub const DEPROVISION_PREFIX: &str = "deprovision-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Provision,
    Deprovision,
}

impl OperationKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            OperationKind::Provision => PROVISION_PREFIX,
            OperationKind::Deprovision => DEPROVISION_PREFIX,
        }
    }

    /// Whether `token` was issued for an operation of this kind.
    pub fn issued(&self, token: &str) -> bool {
        token.starts_with(self.prefix())
    }

    pub(crate) fn started(&self, instance_id: &str) -> String {
        match self {
            OperationKind::Provision => format!("provisioning service instance \"{instance_id}\""),
            OperationKind::Deprovision => {
                format!("deprovisioning service instance \"{instance_id}\"")
            }
        }
    }

    pub(crate) fn succeeded(&self, instance_id: &str) -> String {
        match self {
            OperationKind::Provision => format!("service instance \"{instance_id}\" provisioned"),
            OperationKind::Deprovision => {
                format!("service instance \"{instance_id}\" deprovisioned")
            }
        }
    }

    pub(crate) fn failed(&self, instance_id: &str) -> String {
        match self {
            OperationKind::Provision => {
                format!("service instance \"{instance_id}\" failed to provision")
            }
            OperationKind::Deprovision => {
                format!("service instance \"{instance_id}\" failed to deprovision")
            }
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Provision => write!(f, "provision"),
            OperationKind::Deprovision => write!(f, "deprovision"),
        }
    }
}

/// A fresh, unpredictable operation token such as `provision-3f9c0a7be1d2c845`.
///
/// Tokens are random, not coordinated; collisions are possible in principle
/// but negligible at 64 bits.
pub fn new_operation_token(kind: OperationKind) -> String {
    format!("{}{:016x}", kind.prefix(), rand::random::<u64>())
}

/// Answer to a last-operation poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastOperation {
    pub state: OperationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Reads and writes the operation fields of instance records.
#[derive(Clone)]
pub struct OperationTracker {
    store: Arc<dyn InstanceStore>,
}

impl OperationTracker {
    pub fn new(store: Arc<dyn InstanceStore>) -> Self {
        OperationTracker { store }
    }

    /// Mark a new operation as in progress and return its token.
    pub async fn begin(
        &self,
        instance_id: &str,
        kind: OperationKind,
        description: impl Into<String>,
    ) -> Result<String, StorageError> {
        let token = new_operation_token(kind);
        self.store
            .update(
                instance_id,
                RecordPatch::new().begin_operation(token.clone(), description),
            )
            .await?;
        Ok(token)
    }

    /// Record the terminal state of the current operation. The token is kept.
    pub async fn finish(
        &self,
        instance_id: &str,
        succeeded: bool,
        description: impl Into<String>,
    ) -> Result<(), StorageError> {
        let state = if succeeded {
            OperationState::Succeeded
        } else {
            OperationState::Failed
        };
        self.store
            .update(
                instance_id,
                RecordPatch::new().operation_state(state, description),
            )
            .await
            .map(|_| ())
    }

    /// Report the state of the last operation on `instance_id`.
    ///
    /// - no record at all → `Gone` (a deprovision completed)
    /// - `expected` given but not the stored token → `Concurrency`
    /// - record without any operation → `NotFound`
    pub async fn poll(
        &self,
        instance_id: &str,
        expected: Option<&str>,
    ) -> Result<LastOperation, BrokerError> {
        let record = match self.store.get(instance_id).await {
            Ok(record) => record,
            Err(StorageError::NotFound { .. }) => {
                tracing::debug!(instance_id, "last operation on missing instance");
                return Err(BrokerError::Gone {
                    instance_id: instance_id.to_string(),
                });
            }
            Err(e) => return Err(BrokerError::upstream("poll last operation", instance_id, e)),
        };

        if let Some(presented) = expected {
            if record.operation_name.as_deref() != Some(presented) {
                return Err(BrokerError::Concurrency {
                    instance_id: instance_id.to_string(),
                    presented: presented.to_string(),
                    current: record.operation_name,
                });
            }
        }

        let state = record.operation_state.ok_or_else(|| BrokerError::NotFound {
            what: format!("operation for instance {instance_id}"),
        })?;

        Ok(LastOperation {
            state,
            description: record.operation_description,
        })
    }
}
