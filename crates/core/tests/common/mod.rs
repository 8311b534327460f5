//! In-memory collaborators for broker integration tests.
//!
//! - `FakeCluster`: config maps, services and secrets keyed by namespace/name,
//!   with equality label selection and merge-patching of labels
//! - `FakeInstaller`: "installs" a chart by creating release-labelled
//!   services and secrets in the fake cluster, from a per-chart fixture
//! - `FakeRepository`: a fixed chart index

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use minibroker_core::cluster::{
    ClusterClient, ClusterError, ConfigMap, LabelSelector, Labels, ObjectMeta, ResourceKind,
    Secret, Service, ServicePort, HERITAGE_LABEL, RELEASE_HERITAGE, RELEASE_LABEL,
};
use minibroker_core::installer::{DeleteOptions, InstallRequest, Installer, InstallerError, Release};
use minibroker_core::repository::{ChartRepository, ChartVersion, IndexFile, RepositoryError};
use minibroker_core::{Broker, BrokerConfig, ProviderRegistry};
use minibroker_storage::MemoryInstanceStore;
use tokio::sync::Notify;

pub const BROKER_NAMESPACE: &str = "minibroker";
pub const APPS_NAMESPACE: &str = "apps";

pub const MYSQL_PLAN: &str = "mysql-5-7-14";
pub const POSTGRESQL_PLAN: &str = "postgresql-10-5-0";
pub const REDIS_PLAN: &str = "redis-4-0-11";
pub const EMPTY_PLAN: &str = "empty-1-0";
pub const WORDPRESS_PLAN: &str = "wordpress-4-9-8";

// ──────────────────────────────────────────────
// Cluster
// ──────────────────────────────────────────────

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct ClusterState {
    config_maps: BTreeMap<Key, ConfigMap>,
    services: BTreeMap<Key, Service>,
    secrets: BTreeMap<Key, Secret>,
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service(&self, service: Service) {
        let k = key(&service.metadata.namespace, &service.metadata.name);
        self.state.lock().unwrap().services.insert(k, service);
    }

    pub fn add_secret(&self, secret: Secret) {
        let k = key(&secret.metadata.namespace, &secret.metadata.name);
        self.state.lock().unwrap().secrets.insert(k, secret);
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.state
            .lock()
            .unwrap()
            .services
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&key(namespace, name))
            .cloned()
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.state
            .lock()
            .unwrap()
            .config_maps
            .get(&key(namespace, name))
            .cloned()
    }

    /// Remove every service and secret produced by `release`.
    pub fn remove_release(&self, release: &str) {
        let selector = LabelSelector::release(release);
        let mut state = self.state.lock().unwrap();
        state
            .services
            .retain(|_, s| !selector.matches(&s.metadata.labels));
        state
            .secrets
            .retain(|_, s| !selector.matches(&s.metadata.labels));
    }
}

fn not_found(kind: ResourceKind, namespace: &str, name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError> {
        self.config_map(namespace, name)
            .ok_or_else(|| not_found(ResourceKind::ConfigMap, namespace, name))
    }

    async fn create_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap, ClusterError> {
        let meta = &config_map.metadata;
        let k = key(&meta.namespace, &meta.name);
        let mut state = self.state.lock().unwrap();
        if state.config_maps.contains_key(&k) {
            return Err(ClusterError::AlreadyExists {
                kind: ResourceKind::ConfigMap,
                namespace: meta.namespace.clone(),
                name: meta.name.clone(),
            });
        }
        state.config_maps.insert(k, config_map.clone());
        Ok(config_map)
    }

    async fn update_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap, ClusterError> {
        let meta = &config_map.metadata;
        let mut state = self.state.lock().unwrap();
        match state.config_maps.get_mut(&key(&meta.namespace, &meta.name)) {
            Some(existing) => {
                *existing = config_map.clone();
                Ok(config_map)
            }
            None => Err(not_found(ResourceKind::ConfigMap, &meta.namespace, &meta.name)),
        }
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.state
            .lock()
            .unwrap()
            .config_maps
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::ConfigMap, namespace, name))
    }

    async fn list_services(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Service>, ClusterError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .services
            .values()
            .filter(|s| s.metadata.namespace == namespace && selector.matches(&s.metadata.labels))
            .cloned()
            .collect())
    }

    async fn list_secrets(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Secret>, ClusterError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .secrets
            .values()
            .filter(|s| s.metadata.namespace == namespace && selector.matches(&s.metadata.labels))
            .cloned()
            .collect())
    }

    async fn patch_labels(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        labels: &Labels,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        let k = key(namespace, name);
        let target = match kind {
            ResourceKind::Service => state.services.get_mut(&k).map(|s| &mut s.metadata),
            ResourceKind::Secret => state.secrets.get_mut(&k).map(|s| &mut s.metadata),
            ResourceKind::ConfigMap => state.config_maps.get_mut(&k).map(|c| &mut c.metadata),
        };
        let meta = target.ok_or_else(|| not_found(kind, namespace, name))?;
        meta.labels
            .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Installer
// ──────────────────────────────────────────────

pub fn release_meta(namespace: &str, name: &str, release: &str) -> ObjectMeta {
    ObjectMeta::new(namespace, name)
        .with_label(HERITAGE_LABEL, RELEASE_HERITAGE)
        .with_label(RELEASE_LABEL, release)
        .with_label("app", name)
}

fn service(meta: ObjectMeta, port_name: &str, port: u16) -> Service {
    Service {
        metadata: meta,
        ports: vec![ServicePort {
            name: port_name.to_string(),
            port,
        }],
    }
}

fn secret(meta: ObjectMeta, pairs: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: meta,
        data: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect(),
    }
}

/// Services and secrets a release of `chart` creates.
fn release_objects(chart: &str, release: &str, ns: &str) -> (Vec<Service>, Vec<Secret>) {
    let name = format!("{release}-{chart}");
    let meta = |n: &str| release_meta(ns, n, release);
    match chart {
        "mysql" => (
            vec![service(meta(&name), "mysql", 3306)],
            vec![secret(
                meta(&name),
                &[("mysql-root-password", "r00t"), ("mysql-password", "p@ss")],
            )],
        ),
        "postgresql" => (
            vec![service(meta(&name), "postgresql", 5432)],
            vec![secret(meta(&name), &[("postgresql-password", "hunter2")])],
        ),
        "redis" => (
            vec![
                service(meta(&format!("{name}-slave")), "redis", 6379),
                service(meta(&format!("{name}-master")), "redis", 6379),
            ],
            vec![secret(meta(&name), &[("redis-password", "s3cret")])],
        ),
        // A release that produces no secrets at all.
        "empty" => (vec![service(meta(&name), "http", 80)], vec![]),
        _ => (
            vec![service(meta(&name), "http", 80)],
            vec![secret(meta(&name), &[("password", "changeme")])],
        ),
    }
}

#[derive(Default)]
pub struct FakeInstaller {
    cluster: Arc<FakeCluster>,
    counter: AtomicUsize,
    pub installs: Mutex<Vec<InstallRequest>>,
    pub deletes: Mutex<Vec<(String, DeleteOptions)>>,
    fail_install: AtomicBool,
    panic_install: AtomicBool,
    fail_delete: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeInstaller {
    pub fn new(cluster: Arc<FakeCluster>) -> Self {
        FakeInstaller {
            cluster,
            ..Default::default()
        }
    }

    pub fn fail_installs(&self) {
        self.fail_install.store(true, Ordering::SeqCst);
    }

    pub fn panic_on_install(&self) {
        self.panic_install.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Make installs block until the returned handle is notified.
    pub fn hold_installs(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn install_count(&self) -> usize {
        self.installs.lock().unwrap().len()
    }

    pub fn last_install(&self) -> Option<InstallRequest> {
        self.installs.lock().unwrap().last().cloned()
    }

    pub fn deleted(&self) -> Vec<(String, DeleteOptions)> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Installer for FakeInstaller {
    async fn install(&self, request: InstallRequest) -> Result<Release, InstallerError> {
        self.installs.lock().unwrap().push(request.clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.panic_install.load(Ordering::SeqCst) {
            panic!("installer crashed");
        }
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(InstallerError::Install {
                chart: request.chart_name,
                message: "image pull failed".to_string(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("rel-{n}");
        let (services, secrets) = release_objects(&request.chart_name, &name, &request.namespace);
        for svc in services {
            self.cluster.add_service(svc);
        }
        for sec in secrets {
            self.cluster.add_secret(sec);
        }

        Ok(Release {
            name,
            namespace: request.namespace,
            version: 1,
        })
    }

    async fn delete_release(&self, name: &str, options: DeleteOptions) -> Result<(), InstallerError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(InstallerError::Delete {
                release: name.to_string(),
                message: "tiller unavailable".to_string(),
            });
        }
        self.deletes
            .lock()
            .unwrap()
            .push((name.to_string(), options));
        self.cluster.remove_release(name);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Repository
// ──────────────────────────────────────────────

pub const INDEX: &str = r#"
apiVersion: v1
entries:
  mysql:
    - name: mysql
      version: 0.10.2
      appVersion: 5.7.14
      description: Fast, reliable, scalable, and easy to use open-source relational database system.
      keywords: [mysql, database, sql]
    - name: mysql
      version: 0.10.1
      appVersion: 5.7.14
      description: older packaging
      keywords: [mysql, database]
  postgresql:
    - name: postgresql
      version: 3.1.0
      appVersion: 10.5.0
      keywords: [postgresql, database]
  redis:
    - name: redis
      version: 4.0.0
      appVersion: 4.0.11
      keywords: [redis, keyvalue]
  empty:
    - name: empty
      version: 1.0.0
      appVersion: "1.0"
  wordpress:
    - name: wordpress
      version: 2.1.0
      appVersion: 4.9.8
      keywords: [wordpress, cms]
"#;

pub struct FakeRepository {
    entries: BTreeMap<String, Vec<ChartVersion>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        let index = IndexFile::from_yaml(INDEX).expect("test index parses");
        FakeRepository {
            entries: index.entries,
        }
    }
}

#[async_trait]
impl ChartRepository for FakeRepository {
    async fn list_charts(&self) -> Result<BTreeMap<String, Vec<ChartVersion>>, RepositoryError> {
        Ok(self.entries.clone())
    }

    async fn fetch_chart(&self, name: &str, version: &str) -> Result<Vec<u8>, RepositoryError> {
        let found = self
            .entries
            .get(name)
            .is_some_and(|versions| versions.iter().any(|v| v.version == version));
        if !found {
            return Err(RepositoryError::ChartNotFound {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        Ok(format!("{name}-{version}.tgz").into_bytes())
    }
}

// ──────────────────────────────────────────────
// Harness
// ──────────────────────────────────────────────

pub struct Harness {
    pub broker: Broker,
    pub cluster: Arc<FakeCluster>,
    pub installer: Arc<FakeInstaller>,
    pub store: Arc<MemoryInstanceStore>,
}

pub fn harness() -> Harness {
    harness_with_providers(ProviderRegistry::with_defaults())
}

pub fn harness_with_providers(providers: ProviderRegistry) -> Harness {
    let cluster = Arc::new(FakeCluster::new());
    let installer = Arc::new(FakeInstaller::new(cluster.clone()));
    let store = Arc::new(MemoryInstanceStore::new());

    let broker = Broker::builder(BrokerConfig::new(BROKER_NAMESPACE))
        .repository(Arc::new(FakeRepository::new()))
        .installer(installer.clone())
        .cluster(cluster.clone())
        .store(store.clone())
        .providers(providers)
        .build()
        .expect("broker builds");

    Harness {
        broker,
        cluster,
        installer,
        store,
    }
}

pub fn params(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
