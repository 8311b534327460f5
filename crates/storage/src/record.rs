use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Opaque provisioning parameters as supplied by the platform.
pub type ProvisionParams = serde_json::Map<String, serde_json::Value>;

/// Data keys used when a record is flattened into a string key/value map.
pub mod keys {
    pub const SERVICE_ID: &str = "service-id";
    pub const PLAN_ID: &str = "plan-id";
    pub const PROVISION_PARAMS: &str = "provision-params";
    pub const RELEASE: &str = "release";
    pub const RELEASE_NAMESPACE: &str = "release-namespace";
    pub const OPERATION_NAME: &str = "last-operation-name";
    pub const OPERATION_STATE: &str = "last-operation-state";
    pub const OPERATION_DESCRIPTION: &str = "last-operation-description";
}

/// State of the most recent asynchronous operation on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::InProgress => "in progress",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in progress" => Ok(OperationState::InProgress),
            "succeeded" => Ok(OperationState::Succeeded),
            "failed" => Ok(OperationState::Failed),
            other => Err(format!("unknown operation state '{}'", other)),
        }
    }
}

/// The persisted lifecycle record of one service instance.
///
/// A record exists iff a provision request for `instance_id` was admitted.
/// `release_name` / `release_namespace` stay empty until installation
/// succeeds; the `operation_*` fields describe the last async operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub provision_params: ProvisionParams,
    pub release_name: Option<String>,
    pub release_namespace: Option<String>,
    pub operation_name: Option<String>,
    pub operation_state: Option<OperationState>,
    pub operation_description: Option<String>,
}

impl InstanceRecord {
    /// A freshly reserved record: no release, no operation.
    pub fn new(
        instance_id: impl Into<String>,
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
        provision_params: ProvisionParams,
    ) -> Self {
        InstanceRecord {
            instance_id: instance_id.into(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            provision_params,
            release_name: None,
            release_namespace: None,
            operation_name: None,
            operation_state: None,
            operation_description: None,
        }
    }

    /// Flatten into the string key/value form used by key/value backends.
    pub fn to_data(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let params = serde_json::to_string(&self.provision_params).map_err(|e| {
            StorageError::Corrupt {
                instance_id: self.instance_id.clone(),
                message: format!("could not encode provision parameters: {}", e),
            }
        })?;

        let mut data = BTreeMap::new();
        data.insert(keys::SERVICE_ID.to_string(), self.service_id.clone());
        data.insert(keys::PLAN_ID.to_string(), self.plan_id.clone());
        data.insert(keys::PROVISION_PARAMS.to_string(), params);

        let optional = [
            (keys::RELEASE, self.release_name.clone()),
            (keys::RELEASE_NAMESPACE, self.release_namespace.clone()),
            (keys::OPERATION_NAME, self.operation_name.clone()),
            (
                keys::OPERATION_STATE,
                self.operation_state.map(|s| s.as_str().to_string()),
            ),
            (
                keys::OPERATION_DESCRIPTION,
                self.operation_description.clone(),
            ),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                data.insert(key.to_string(), value);
            }
        }

        Ok(data)
    }

    /// Rebuild a record from its key/value form.
    ///
    /// Missing `provision-params` decodes as an empty map; an unparsable one
    /// or an unknown operation state is reported as `Corrupt`.
    pub fn from_data(
        instance_id: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<Self, StorageError> {
        let corrupt = |message: String| StorageError::Corrupt {
            instance_id: instance_id.to_string(),
            message,
        };

        let provision_params = match data.get(keys::PROVISION_PARAMS) {
            Some(raw) if !raw.is_empty() => {
                match serde_json::from_str::<serde_json::Value>(raw) {
                    Ok(serde_json::Value::Object(map)) => map,
                    Ok(serde_json::Value::Null) => ProvisionParams::new(),
                    Ok(other) => {
                        return Err(corrupt(format!(
                            "provision parameters must be an object, got {}",
                            other
                        )))
                    }
                    Err(e) => {
                        return Err(corrupt(format!(
                            "could not decode provision parameters: {}",
                            e
                        )))
                    }
                }
            }
            _ => ProvisionParams::new(),
        };

        let operation_state = data
            .get(keys::OPERATION_STATE)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<OperationState>())
            .transpose()
            .map_err(corrupt)?;

        let text = |key: &str| data.get(key).filter(|v| !v.is_empty()).cloned();

        Ok(InstanceRecord {
            instance_id: instance_id.to_string(),
            service_id: text(keys::SERVICE_ID).unwrap_or_default(),
            plan_id: text(keys::PLAN_ID).unwrap_or_default(),
            provision_params,
            release_name: text(keys::RELEASE),
            release_namespace: text(keys::RELEASE_NAMESPACE),
            operation_name: text(keys::OPERATION_NAME),
            operation_state,
            operation_description: text(keys::OPERATION_DESCRIPTION),
        })
    }
}

/// One field of a [`RecordPatch`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    /// Leave the stored value untouched.
    #[default]
    Keep,
    Set(T),
    /// Remove the field from the record (never stored as an empty string).
    Clear,
}

impl<T> Field<T> {
    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Field::Keep => {}
            Field::Set(value) => *slot = Some(value),
            Field::Clear => *slot = None,
        }
    }
}

/// A partial update merged into an existing record by `InstanceStore::update`.
///
/// Identity fields (`instance_id`, `service_id`, `plan_id`,
/// `provision_params`) are fixed at creation and cannot be patched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordPatch {
    pub release_name: Field<String>,
    pub release_namespace: Field<String>,
    pub operation_name: Field<String>,
    pub operation_state: Field<OperationState>,
    pub operation_description: Field<String>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the release produced by a successful installation.
    pub fn release(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.release_name = Field::Set(name.into());
        self.release_namespace = Field::Set(namespace.into());
        self
    }

    /// Start tracking a new operation under `token`.
    pub fn begin_operation(
        mut self,
        token: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.operation_name = Field::Set(token.into());
        self.operation_state = Field::Set(OperationState::InProgress);
        self.operation_description = Field::Set(description.into());
        self
    }

    /// Move the current operation to a new state, keeping its token.
    pub fn operation_state(
        mut self,
        state: OperationState,
        description: impl Into<String>,
    ) -> Self {
        self.operation_state = Field::Set(state);
        self.operation_description = Field::Set(description.into());
        self
    }

    /// Forget the last operation entirely.
    pub fn clear_operation(mut self) -> Self {
        self.operation_name = Field::Clear;
        self.operation_state = Field::Clear;
        self.operation_description = Field::Clear;
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }

    /// Merge this patch into `record`.
    pub fn apply(self, record: &mut InstanceRecord) {
        self.release_name.apply_to(&mut record.release_name);
        self.release_namespace.apply_to(&mut record.release_namespace);
        self.operation_name.apply_to(&mut record.operation_name);
        self.operation_state.apply_to(&mut record.operation_state);
        self.operation_description
            .apply_to(&mut record.operation_description);
    }
}
