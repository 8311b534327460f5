//! Binding: rediscover an instance's services and secrets by label and turn
//! them into a flat credential map.

use serde_json::Value;

use crate::broker::Broker;
use crate::error::BrokerError;
use crate::provider::{Params, SecretData};

#[derive(Debug, Clone, PartialEq)]
pub struct BindRequest {
    pub instance_id: String,
    /// Selects the credential provider. Empty means the instance's own service.
    pub service_id: String,
    pub params: Params,
}

impl BindRequest {
    pub fn new(instance_id: impl Into<String>, service_id: impl Into<String>) -> Self {
        BindRequest {
            instance_id: instance_id.into(),
            service_id: service_id.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Provision parameters overlaid with bind parameters; bind wins.
pub fn merge_params(provisioned: &Params, bind: &Params) -> Params {
    let mut merged = provisioned.clone();
    merged.extend(bind.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

impl Broker {
    /// Credentials for `request.instance_id`.
    ///
    /// Every key of every associated secret is included as text. When a
    /// provider is registered for the service, its credentials are laid
    /// over that data.
    pub async fn bind(
        &self,
        request: BindRequest,
    ) -> Result<serde_json::Map<String, Value>, BrokerError> {
        let inner = &self.inner;
        let id = request.instance_id.as_str();

        let record = inner
            .store
            .get(id)
            .await
            .map_err(|e| BrokerError::from_storage("read instance", e))?;
        let params = merge_params(&record.provision_params, &request.params);

        let namespace = record
            .release_namespace
            .as_deref()
            .ok_or_else(|| BrokerError::NotFound {
                what: format!("release of instance {id}"),
            })?;
        let resources = inner
            .association
            .find_by_instance(id, namespace)
            .await
            .map_err(|e| BrokerError::upstream("discover instance resources", id, e))?;
        if resources.services.is_empty() {
            return Err(BrokerError::NotFound {
                what: format!("services of instance {id}"),
            });
        }
        if resources.secrets.is_empty() {
            return Err(BrokerError::NotFound {
                what: format!("secrets of instance {id}"),
            });
        }

        let secret_data: SecretData = resources
            .secrets
            .iter()
            .flat_map(|secret| secret.data.iter())
            .map(|(key, value)| (key.clone(), String::from_utf8_lossy(value).into_owned()))
            .collect();
        let mut credentials: serde_json::Map<String, Value> = secret_data
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let service_id = if request.service_id.is_empty() {
            record.service_id.as_str()
        } else {
            request.service_id.as_str()
        };
        match inner.providers.get(service_id) {
            Some(provider) => {
                let shaped = provider
                    .bind(&resources.services, &params, &secret_data)
                    .map_err(|source| BrokerError::Bind {
                        instance_id: id.to_string(),
                        source,
                    })?;
                credentials.extend(shaped.to_map());
            }
            None => tracing::debug!(instance_id = id, service_id, "no provider, returning raw secret data"),
        }

        tracing::info!(instance_id = id, keys = credentials.len(), "instance bound");
        Ok(credentials)
    }
}
