use std::future::Future;

use super::{make_record, TestResult};
use crate::{InstanceStore, StorageError};

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "create",
            "create_then_get_returns_record",
            create_then_get_returns_record(factory).await,
        ),
        TestResult::from_result(
            "create",
            "created_record_has_no_release_or_operation",
            created_record_has_no_release_or_operation(factory).await,
        ),
        TestResult::from_result(
            "create",
            "duplicate_create_is_rejected",
            duplicate_create_is_rejected(factory).await,
        ),
        TestResult::from_result(
            "create",
            "duplicate_create_does_not_overwrite",
            duplicate_create_does_not_overwrite(factory).await,
        ),
        TestResult::from_result(
            "create",
            "get_missing_is_not_found",
            get_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "create",
            "records_are_isolated_by_id",
            records_are_isolated_by_id(factory).await,
        ),
    ]
}

async fn create_then_get_returns_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_record("inst-1");
    store
        .create(record.clone())
        .await
        .map_err(|e| format!("create: {e}"))?;

    let got = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;
    if got != record {
        return Err(format!("expected {:?}, got {:?}", record, got));
    }
    Ok(())
}

async fn created_record_has_no_release_or_operation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create(make_record("inst-1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let got = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;
    if got.release_name.is_some() || got.release_namespace.is_some() {
        return Err(format!("fresh record already has a release: {:?}", got));
    }
    if got.operation_name.is_some() || got.operation_state.is_some() {
        return Err(format!("fresh record already has an operation: {:?}", got));
    }
    Ok(())
}

async fn duplicate_create_is_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create(make_record("inst-1"))
        .await
        .map_err(|e| format!("first create: {e}"))?;

    match store.create(make_record("inst-1")).await {
        Err(StorageError::AlreadyExists { instance_id }) if instance_id == "inst-1" => Ok(()),
        other => Err(format!("expected AlreadyExists for inst-1, got {:?}", other)),
    }
}

async fn duplicate_create_does_not_overwrite<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let original = make_record("inst-1");
    store
        .create(original.clone())
        .await
        .map_err(|e| format!("first create: {e}"))?;

    let mut intruder = make_record("inst-1");
    intruder.plan_id = "mariadb-10-3-22".to_string();
    let _ = store.create(intruder).await;

    let got = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;
    if got.plan_id != original.plan_id {
        return Err(format!(
            "duplicate create overwrote plan: expected {}, got {}",
            original.plan_id, got.plan_id
        ));
    }
    Ok(())
}

async fn get_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get("nope").await {
        Err(StorageError::NotFound { instance_id }) if instance_id == "nope" => Ok(()),
        other => Err(format!("expected NotFound for 'nope', got {:?}", other)),
    }
}

async fn records_are_isolated_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create(make_record("inst-a"))
        .await
        .map_err(|e| format!("create a: {e}"))?;
    store
        .create(make_record("inst-b"))
        .await
        .map_err(|e| format!("create b: {e}"))?;

    let a = store.get("inst-a").await.map_err(|e| format!("get a: {e}"))?;
    let b = store.get("inst-b").await.map_err(|e| format!("get b: {e}"))?;
    if a.instance_id != "inst-a" || b.instance_id != "inst-b" {
        return Err(format!("records mixed up: {:?} / {:?}", a, b));
    }
    Ok(())
}
