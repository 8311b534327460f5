use std::future::Future;

use super::{make_record, TestResult};
use crate::{InstanceStore, StorageError};

pub(super) async fn run_delete_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "delete",
            "delete_removes_record",
            delete_removes_record(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_missing_is_not_found",
            delete_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "delete_twice_second_is_not_found",
            delete_twice_second_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "delete",
            "create_after_delete_succeeds",
            create_after_delete_succeeds(factory).await,
        ),
    ]
}

async fn delete_removes_record<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .delete("inst-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;

    match store.get("inst-1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound after delete, got {:?}", other)),
    }
}

async fn delete_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.delete("ghost").await {
        Err(StorageError::NotFound { instance_id }) if instance_id == "ghost" => Ok(()),
        other => Err(format!("expected NotFound for 'ghost', got {:?}", other)),
    }
}

async fn delete_twice_second_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .delete("inst-1")
        .await
        .map_err(|e| format!("first delete: {e}"))?;

    match store.delete("inst-1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("expected NotFound on second delete, got {:?}", other)),
    }
}

async fn create_after_delete_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .delete("inst-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    store
        .create(make_record("inst-1"))
        .await
        .map_err(|e| format!("re-create: {e}"))?;

    store
        .get("inst-1")
        .await
        .map(|_| ())
        .map_err(|e| format!("get after re-create: {e}"))
}
