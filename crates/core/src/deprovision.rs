//! Deprovisioning: delete the release, then the instance record.

use minibroker_storage::StorageError;
use serde::Serialize;

use crate::broker::{Broker, BrokerInner};
use crate::error::BrokerError;
use crate::installer::DeleteOptions;
use crate::operation::OperationKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprovisionRequest {
    pub instance_id: String,
    pub accepts_incomplete: bool,
}

impl DeprovisionRequest {
    pub fn new(instance_id: impl Into<String>) -> Self {
        DeprovisionRequest {
            instance_id: instance_id.into(),
            accepts_incomplete: false,
        }
    }

    pub fn accepts_incomplete(mut self, accepts: bool) -> Self {
        self.accepts_incomplete = accepts;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeprovisionOutcome {
    Deprovisioned,
    /// Teardown continues in the background under `operation`. Once the
    /// record is gone, polling reports `Gone`.
    Accepted { operation: String },
    /// There was no such instance. Deprovisioning is idempotent, so this is
    /// a successful answer.
    Gone,
}

impl DeprovisionOutcome {
    pub fn operation(&self) -> Option<&str> {
        match self {
            DeprovisionOutcome::Accepted { operation } => Some(operation),
            _ => None,
        }
    }
}

impl Broker {
    /// Deprovision `request.instance_id`.
    ///
    /// A record without a release whose provision is still running, sync or
    /// async, is `OperationInProgress`. One whose provision failed is
    /// removed without calling the installer.
    pub async fn deprovision(
        &self,
        request: DeprovisionRequest,
    ) -> Result<DeprovisionOutcome, BrokerError> {
        let inner = &self.inner;
        let instance_id = request.instance_id;

        let record = match inner.store.get(&instance_id).await {
            Ok(record) => record,
            Err(StorageError::NotFound { .. }) => {
                tracing::info!(instance_id = %instance_id, "deprovision of unknown instance");
                return Ok(DeprovisionOutcome::Gone);
            }
            Err(e) => return Err(BrokerError::upstream("read instance", &instance_id, e)),
        };

        if record.release_name.is_none() {
            let provisioning = record.operation_state.is_some_and(|state| !state.is_terminal())
                && record
                    .operation_name
                    .as_deref()
                    .is_some_and(|token| OperationKind::Provision.issued(token));
            if provisioning {
                return Err(BrokerError::OperationInProgress { instance_id });
            }
            tracing::info!(instance_id = %instance_id, "instance has no release, removing record only");
        }

        if !request.accepts_incomplete {
            inner.teardown(&instance_id, record.release_name).await?;
            return Ok(DeprovisionOutcome::Deprovisioned);
        }

        let kind = OperationKind::Deprovision;
        let operation = match inner
            .tracker
            .begin(&instance_id, kind, kind.started(&instance_id))
            .await
        {
            Ok(operation) => operation,
            // Removed since we read it.
            Err(StorageError::NotFound { .. }) => return Ok(DeprovisionOutcome::Gone),
            Err(e) => return Err(BrokerError::upstream("begin deprovision", &instance_id, e)),
        };

        let background = self.inner.clone();
        let release = record.release_name;
        let id = instance_id.clone();
        inner
            .tasks
            .spawn_operation(inner.tracker.clone(), instance_id.clone(), kind, async move {
                background.teardown(&id, release).await
            })
            .await;

        tracing::info!(instance_id = %instance_id, operation = %operation, "deprovision accepted");
        Ok(DeprovisionOutcome::Accepted { operation })
    }
}

impl BrokerInner {
    async fn teardown(&self, instance_id: &str, release: Option<String>) -> Result<(), BrokerError> {
        if let Some(release) = release {
            self.installer
                .delete_release(&release, DeleteOptions::purge_with_hooks())
                .await
                .map_err(|e| BrokerError::upstream("delete release", instance_id, e))?;
            tracing::info!(instance_id, release = %release, "release deleted");
        }

        match self.store.delete(instance_id).await {
            Ok(()) | Err(StorageError::NotFound { .. }) => {}
            Err(e) => return Err(BrokerError::upstream("delete instance record", instance_id, e)),
        }
        tracing::info!(instance_id, "instance deprovisioned");
        Ok(())
    }
}
