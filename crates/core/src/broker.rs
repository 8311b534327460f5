//! The broker facade and its construction.

use std::sync::Arc;

use minibroker_storage::InstanceStore;

use crate::association::ResourceAssociation;
use crate::catalog::{build_catalog, Catalog};
use crate::cluster::ClusterClient;
use crate::config::{BrokerConfig, ConfigError};
use crate::error::BrokerError;
use crate::installer::Installer;
use crate::operation::{LastOperation, OperationTracker};
use crate::provider::ProviderRegistry;
use crate::repository::ChartRepository;
use crate::store::ConfigMapInstanceStore;
use crate::tasks::BackgroundTasks;

/// The broker engine. Cheap to clone; clones share state and background tasks.
#[derive(Clone)]
pub struct Broker {
    pub(crate) inner: Arc<BrokerInner>,
}

pub(crate) struct BrokerInner {
    pub(crate) config: BrokerConfig,
    pub(crate) repository: Arc<dyn ChartRepository>,
    pub(crate) installer: Arc<dyn Installer>,
    pub(crate) store: Arc<dyn InstanceStore>,
    pub(crate) tracker: OperationTracker,
    pub(crate) association: ResourceAssociation,
    pub(crate) providers: ProviderRegistry,
    pub(crate) tasks: BackgroundTasks,
}

impl Broker {
    pub fn builder(config: BrokerConfig) -> BrokerBuilder {
        BrokerBuilder::new(config)
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.inner.providers
    }

    /// Prepare the chart repository. Call once before serving requests.
    pub async fn init(&self) -> Result<(), BrokerError> {
        self.inner
            .repository
            .init()
            .await
            .map_err(|e| BrokerError::Upstream {
                operation: "initialise chart repository",
                instance_id: None,
                source: e.into(),
            })?;
        tracing::info!(
            repository = %self.inner.config.repository_url,
            namespace = %self.inner.config.namespace,
            "broker initialised"
        );
        Ok(())
    }

    /// The current catalog, built from the repository's chart listing.
    pub async fn list_catalog(&self) -> Result<Catalog, BrokerError> {
        self.inner.catalog().await
    }

    /// State of the last async operation on `instance_id`.
    ///
    /// When `operation` is given it must be the instance's current token.
    pub async fn last_operation(
        &self,
        instance_id: &str,
        operation: Option<&str>,
    ) -> Result<LastOperation, BrokerError> {
        self.inner.tracker.poll(instance_id, operation).await
    }

    /// Wait for every background operation started so far.
    pub async fn drain(&self) {
        self.inner.tasks.drain().await;
    }
}

impl BrokerInner {
    pub(crate) async fn catalog(&self) -> Result<Catalog, BrokerError> {
        let charts = self
            .repository
            .list_charts()
            .await
            .map_err(|e| BrokerError::Upstream {
                operation: "list charts",
                instance_id: None,
                source: e.into(),
            })?;

        let enabled_only = self.config.catalog_enabled_only;
        let catalog = build_catalog(&charts, |name| {
            !enabled_only || self.providers.contains(name)
        });
        tracing::debug!(services = catalog.services.len(), "catalog built");
        Ok(catalog)
    }
}

/// Assembles a [`Broker`] from its configuration and collaborators.
///
/// The chart repository, installer and cluster client are required. The
/// record store defaults to [`ConfigMapInstanceStore`] in the configured
/// namespace; providers default to [`ProviderRegistry::with_defaults`].
pub struct BrokerBuilder {
    config: BrokerConfig,
    repository: Option<Arc<dyn ChartRepository>>,
    installer: Option<Arc<dyn Installer>>,
    cluster: Option<Arc<dyn ClusterClient>>,
    store: Option<Arc<dyn InstanceStore>>,
    providers: Option<ProviderRegistry>,
}

impl BrokerBuilder {
    pub fn new(config: BrokerConfig) -> Self {
        BrokerBuilder {
            config,
            repository: None,
            installer: None,
            cluster: None,
            store: None,
            providers: None,
        }
    }

    pub fn repository(mut self, repository: Arc<dyn ChartRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn store(mut self, store: Arc<dyn InstanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn build(self) -> Result<Broker, BrokerError> {
        self.config.validate()?;

        let repository = self
            .repository
            .ok_or(ConfigError::MissingCollaborator("chart repository"))?;
        let installer = self
            .installer
            .ok_or(ConfigError::MissingCollaborator("installer"))?;
        let cluster = self
            .cluster
            .ok_or(ConfigError::MissingCollaborator("cluster client"))?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(ConfigMapInstanceStore::new(
                cluster.clone(),
                self.config.namespace.clone(),
            )),
        };

        Ok(Broker {
            inner: Arc::new(BrokerInner {
                tracker: OperationTracker::new(store.clone()),
                association: ResourceAssociation::new(cluster),
                providers: self.providers.unwrap_or_default(),
                tasks: BackgroundTasks::new(),
                config: self.config,
                repository,
                installer,
                store,
            }),
        })
    }
}
