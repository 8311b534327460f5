//! Synchronous provisioning and deprovisioning against fake collaborators.

mod common;

use common::*;
use minibroker_core::cluster::INSTANCE_LABEL;
use minibroker_core::{
    BrokerError, DeprovisionOutcome, DeprovisionRequest, ErrorKind, InstanceStore,
    OperationState, ProvisionOutcome, ProvisionRequest,
};
use serde_json::json;

fn mysql_request(instance_id: &str) -> ProvisionRequest {
    ProvisionRequest::new(instance_id, "mysql", MYSQL_PLAN)
        .in_namespace(APPS_NAMESPACE)
        .with_params(params(json!({"mysqlDatabase": "shop"})))
}

#[tokio::test]
async fn sync_provision_installs_labels_and_records_release() {
    let h = harness();

    let outcome = h.broker.provision(mysql_request("i-1")).await.unwrap();
    assert_eq!(outcome, ProvisionOutcome::Provisioned);
    assert_eq!(outcome.operation(), None);

    let install = h.installer.last_install().unwrap();
    assert_eq!(install.chart_name, "mysql");
    // Highest chart version packaging app 5.7.14.
    assert_eq!(install.chart_version, "0.10.2");
    assert_eq!(install.chart, b"mysql-0.10.2.tgz".to_vec());
    assert_eq!(install.namespace, APPS_NAMESPACE);
    assert!(install.values.contains("mysqlDatabase: shop"));
    assert!(install.reuse_name);
    assert!(install.disable_hooks);
    assert!(!install.wait);

    let record = h.store.get("i-1").await.unwrap();
    assert_eq!(record.service_id, "mysql");
    assert_eq!(record.plan_id, MYSQL_PLAN);
    assert_eq!(record.release_name.as_deref(), Some("rel-1"));
    assert_eq!(record.release_namespace.as_deref(), Some(APPS_NAMESPACE));
    assert_eq!(record.provision_params["mysqlDatabase"], json!("shop"));
    assert_eq!(record.operation_name, None);

    let svc = h.cluster.service(APPS_NAMESPACE, "rel-1-mysql").unwrap();
    assert_eq!(svc.metadata.labels.get(INSTANCE_LABEL).map(String::as_str), Some("i-1"));
    // The merge patch keeps the release's own labels.
    assert_eq!(svc.metadata.labels.get("release").map(String::as_str), Some("rel-1"));
    let secret = h.cluster.secret(APPS_NAMESPACE, "rel-1-mysql").unwrap();
    assert_eq!(secret.metadata.labels.get(INSTANCE_LABEL).map(String::as_str), Some("i-1"));
}

#[tokio::test]
async fn empty_namespace_installs_into_broker_namespace() {
    let h = harness();
    h.broker
        .provision(ProvisionRequest::new("i-1", "redis", REDIS_PLAN))
        .await
        .unwrap();

    assert_eq!(h.installer.last_install().unwrap().namespace, BROKER_NAMESPACE);
    let record = h.store.get("i-1").await.unwrap();
    assert_eq!(record.release_namespace.as_deref(), Some(BROKER_NAMESPACE));
}

#[tokio::test]
async fn second_provision_of_same_instance_conflicts() {
    let h = harness();
    h.broker.provision(mysql_request("i-1")).await.unwrap();

    let err = h.broker.provision(mysql_request("i-1")).await.unwrap_err();
    assert!(matches!(err, BrokerError::Conflict { .. }), "got {err:?}");
    assert_eq!(err.reason_code(), Some("ConcurrencyError"));
    assert_eq!(h.installer.install_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_provisions_admit_exactly_one() {
    let h = harness();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let broker = h.broker.clone();
        handles.push(tokio::spawn(async move {
            broker.provision(mysql_request("contested")).await
        }));
    }

    let mut admitted = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(BrokerError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(h.installer.install_count(), 1);
}

#[tokio::test]
async fn unknown_plan_reserves_nothing() {
    let h = harness();

    let err = h
        .broker
        .provision(ProvisionRequest::new("i-1", "mysql", "mysql-9-9-9"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownPlan { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = h
        .broker
        .provision(ProvisionRequest::new("i-1", "cassandra", "cassandra-3-11"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownPlan { .. }));

    assert!(h.store.is_empty().await);
    assert_eq!(h.installer.install_count(), 0);
}

#[tokio::test]
async fn failed_sync_install_leaves_record_without_release() {
    let h = harness();
    h.installer.fail_installs();

    let err = h.broker.provision(mysql_request("i-1")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(err.to_string(), "install release failed for instance i-1");

    let record = h.store.get("i-1").await.unwrap();
    assert_eq!(record.release_name, None);
    assert_eq!(record.operation_state, Some(OperationState::Failed));

    // The half-provisioned instance can still be cleaned up.
    let outcome = h
        .broker
        .deprovision(DeprovisionRequest::new("i-1"))
        .await
        .unwrap();
    assert_eq!(outcome, DeprovisionOutcome::Deprovisioned);
    assert!(h.installer.deleted().is_empty());
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn sync_deprovision_purges_release_and_removes_record() {
    let h = harness();
    h.broker.provision(mysql_request("i-1")).await.unwrap();

    let outcome = h
        .broker
        .deprovision(DeprovisionRequest::new("i-1"))
        .await
        .unwrap();
    assert_eq!(outcome, DeprovisionOutcome::Deprovisioned);

    let deleted = h.installer.deleted();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].0, "rel-1");
    assert!(deleted[0].1.purge);
    assert!(!deleted[0].1.disable_hooks);

    assert!(h.store.is_empty().await);
    assert!(h.cluster.service(APPS_NAMESPACE, "rel-1-mysql").is_none());
}

#[tokio::test]
async fn deprovision_of_unknown_instance_is_gone() {
    let h = harness();

    let sync = h
        .broker
        .deprovision(DeprovisionRequest::new("never-existed"))
        .await
        .unwrap();
    assert_eq!(sync, DeprovisionOutcome::Gone);

    let async_ = h
        .broker
        .deprovision(DeprovisionRequest::new("never-existed").accepts_incomplete(true))
        .await
        .unwrap();
    assert_eq!(async_, DeprovisionOutcome::Gone);
    assert!(h.installer.deleted().is_empty());
}

#[tokio::test]
async fn deprovision_is_idempotent() {
    let h = harness();
    h.broker.provision(mysql_request("i-1")).await.unwrap();

    let first = h.broker.deprovision(DeprovisionRequest::new("i-1")).await.unwrap();
    let second = h.broker.deprovision(DeprovisionRequest::new("i-1")).await.unwrap();
    assert_eq!(first, DeprovisionOutcome::Deprovisioned);
    assert_eq!(second, DeprovisionOutcome::Gone);
    assert_eq!(h.installer.deleted().len(), 1);
}

#[tokio::test]
async fn failed_release_deletion_keeps_record() {
    let h = harness();
    h.broker.provision(mysql_request("i-1")).await.unwrap();
    h.installer.fail_deletes();

    let err = h
        .broker
        .deprovision(DeprovisionRequest::new("i-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(h.store.get("i-1").await.is_ok());
}

#[tokio::test]
async fn catalog_lists_every_chart() {
    let h = harness();
    let catalog = h.broker.list_catalog().await.unwrap();

    let ids: Vec<&str> = catalog.services.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["empty", "mysql", "postgresql", "redis", "wordpress"]);

    let mysql = catalog.service("mysql").unwrap();
    assert_eq!(mysql.plans.len(), 1);
    assert_eq!(mysql.plans[0].id, MYSQL_PLAN);
    assert_eq!(mysql.tags, vec!["mysql", "database"]);
    assert_eq!(catalog.resolve("mysql", MYSQL_PLAN), Some("0.10.2"));
}

#[tokio::test]
async fn enabled_only_catalog_hides_charts_without_provider() {
    use std::sync::Arc;

    use minibroker_core::{Broker, BrokerConfig};

    let cluster = Arc::new(FakeCluster::new());
    let broker = Broker::builder(BrokerConfig::new(BROKER_NAMESPACE).with_catalog_enabled_only(true))
        .repository(Arc::new(FakeRepository::new()))
        .installer(Arc::new(FakeInstaller::new(cluster.clone())))
        .cluster(cluster)
        .build()
        .unwrap();

    let catalog = broker.list_catalog().await.unwrap();
    let ids: Vec<&str> = catalog.services.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["mysql", "postgresql", "redis"]);

    // Hidden services cannot be provisioned either.
    let err = broker
        .provision(ProvisionRequest::new("i-1", "wordpress", WORDPRESS_PLAN))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::UnknownPlan { .. }));
}

#[tokio::test]
async fn builder_requires_collaborators() {
    use minibroker_core::{Broker, BrokerConfig, ConfigError};

    let err = Broker::builder(BrokerConfig::new(BROKER_NAMESPACE))
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        BrokerError::Config(ConfigError::MissingCollaborator("chart repository"))
    ));
    assert_eq!(err.kind(), ErrorKind::Config);
}
