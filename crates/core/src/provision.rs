//! Provisioning: reserve the instance, install its chart, label what the
//! release produced and record the release on the instance.

use minibroker_storage::{InstanceRecord, ProvisionParams, RecordPatch};
use serde::Serialize;

use crate::broker::{Broker, BrokerInner};
use crate::error::BrokerError;
use crate::installer::InstallRequest;
use crate::operation::{new_operation_token, OperationKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionRequest {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    /// Namespace to install into. Empty means the broker's own namespace.
    pub namespace: String,
    /// The caller accepts an asynchronous answer.
    pub accepts_incomplete: bool,
    /// Value overrides for the chart.
    pub params: ProvisionParams,
}

impl ProvisionRequest {
    pub fn new(
        instance_id: impl Into<String>,
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
    ) -> Self {
        ProvisionRequest {
            instance_id: instance_id.into(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            namespace: String::new(),
            accepts_incomplete: false,
            params: ProvisionParams::new(),
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn accepts_incomplete(mut self, accepts: bool) -> Self {
        self.accepts_incomplete = accepts;
        self
    }

    pub fn with_params(mut self, params: ProvisionParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisionOutcome {
    /// The release is installed and recorded.
    Provisioned,
    /// Installation continues in the background under `operation`.
    Accepted { operation: String },
}

impl ProvisionOutcome {
    pub fn operation(&self) -> Option<&str> {
        match self {
            ProvisionOutcome::Provisioned => None,
            ProvisionOutcome::Accepted { operation } => Some(operation),
        }
    }
}

/// What the install step needs once the instance is reserved.
struct InstallJob {
    instance_id: String,
    chart_name: String,
    chart_version: String,
    namespace: String,
    params: ProvisionParams,
    wait: bool,
    /// The caller is told about the operation token and polls for the outcome.
    tracked: bool,
}

impl Broker {
    /// Provision `request.instance_id`.
    ///
    /// The plan is resolved before anything is written; an unknown plan
    /// reserves nothing. Creating the instance record is the admission
    /// gate: a second provision of the same ID fails with `Conflict`.
    ///
    /// The record is created with a provision operation already in progress,
    /// so a deprovision racing the install is turned away as retryable. A
    /// synchronous provision clears the operation once the release is
    /// recorded. Failures mark the operation `failed` and leave the record
    /// without a release, so the instance can still be deprovisioned.
    pub async fn provision(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionOutcome, BrokerError> {
        let inner = &self.inner;
        let instance_id = request.instance_id;

        let catalog = inner.catalog().await?;
        let chart_version = catalog
            .resolve(&request.service_id, &request.plan_id)
            .ok_or_else(|| BrokerError::UnknownPlan {
                service_id: request.service_id.clone(),
                plan_id: request.plan_id.clone(),
            })?
            .to_string();

        let kind = OperationKind::Provision;
        let operation = new_operation_token(kind);
        let mut record = InstanceRecord::new(
            &instance_id,
            &request.service_id,
            &request.plan_id,
            request.params.clone(),
        );
        RecordPatch::new()
            .begin_operation(operation.clone(), kind.started(&instance_id))
            .apply(&mut record);

        inner
            .store
            .create(record)
            .await
            .map_err(|e| BrokerError::from_storage("reserve instance", e))?;
        tracing::info!(
            instance_id = %instance_id,
            service_id = %request.service_id,
            plan_id = %request.plan_id,
            chart_version = %chart_version,
            "instance reserved"
        );

        let namespace = if request.namespace.is_empty() {
            inner.config.namespace.clone()
        } else {
            request.namespace
        };
        let job = InstallJob {
            instance_id: instance_id.clone(),
            chart_name: request.service_id,
            chart_version,
            namespace,
            params: request.params,
            wait: request.accepts_incomplete,
            tracked: request.accepts_incomplete,
        };

        if !request.accepts_incomplete {
            if let Err(err) = inner.install(job).await {
                if let Err(e) = inner
                    .tracker
                    .finish(&instance_id, false, kind.failed(&instance_id))
                    .await
                {
                    tracing::error!(instance_id = %instance_id, error = %e, "could not record failed provision");
                }
                return Err(err);
            }
            return Ok(ProvisionOutcome::Provisioned);
        }

        let background = self.inner.clone();
        inner
            .tasks
            .spawn_operation(
                inner.tracker.clone(),
                instance_id.clone(),
                kind,
                async move { background.install(job).await },
            )
            .await;

        tracing::info!(instance_id = %instance_id, operation = %operation, "provision accepted");
        Ok(ProvisionOutcome::Accepted { operation })
    }
}

impl BrokerInner {
    async fn install(&self, job: InstallJob) -> Result<(), BrokerError> {
        let id = job.instance_id.as_str();

        let chart = self
            .repository
            .fetch_chart(&job.chart_name, &job.chart_version)
            .await
            .map_err(|e| BrokerError::upstream("fetch chart", id, e))?;
        let values = serde_yaml::to_string(&job.params)
            .map_err(|e| BrokerError::upstream("render values", id, e))?;

        let release = self
            .installer
            .install(InstallRequest {
                chart_name: job.chart_name.clone(),
                chart_version: job.chart_version.clone(),
                chart,
                namespace: job.namespace.clone(),
                values,
                reuse_name: true,
                disable_hooks: true,
                wait: job.wait,
            })
            .await
            .map_err(|e| BrokerError::upstream("install release", id, e))?;
        tracing::info!(
            instance_id = id,
            release = %release.name,
            namespace = %release.namespace,
            chart = %job.chart_name,
            version = %job.chart_version,
            "release installed"
        );

        let resources = self
            .association
            .find_by_release(&release.name, &release.namespace)
            .await
            .map_err(|e| BrokerError::upstream("discover release resources", id, e))?;
        let labelled = self
            .association
            .associate(&resources, id)
            .await
            .map_err(|e| BrokerError::upstream("label release resources", id, e))?;
        tracing::debug!(instance_id = id, labelled, "release resources associated");

        let mut patch = RecordPatch::new().release(&release.name, &release.namespace);
        if !job.tracked {
            patch = patch.clear_operation();
        }
        self.store
            .update(id, patch)
            .await
            .map_err(|e| BrokerError::upstream("record release", id, e))?;
        tracing::info!(instance_id = id, release = %release.name, "instance provisioned");
        Ok(())
    }
}
