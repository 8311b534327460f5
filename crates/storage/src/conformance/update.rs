use std::future::Future;

use super::{make_record, TestResult};
use crate::{InstanceStore, OperationState, RecordPatch, StorageError};

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "update_sets_release",
            update_sets_release(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_preserves_untouched_fields",
            update_preserves_untouched_fields(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_clear_removes_field",
            update_clear_removes_field(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_returns_merged_record",
            update_returns_merged_record(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_missing_is_not_found",
            update_missing_is_not_found(factory).await,
        ),
    ]
}

async fn update_sets_release<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .update("inst-1", RecordPatch::new().release("lanky-seal", "apps"))
        .await
        .map_err(|e| format!("update: {e}"))?;

    let got = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;
    if got.release_name.as_deref() != Some("lanky-seal")
        || got.release_namespace.as_deref() != Some("apps")
    {
        return Err(format!("release not recorded: {:?}", got));
    }
    Ok(())
}

async fn update_preserves_untouched_fields<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("create: {e}"))?;
    store
        .update(
            "inst-1",
            RecordPatch::new().begin_operation("provision-7b", "provisioning"),
        )
        .await
        .map_err(|e| format!("begin: {e}"))?;
    store
        .update("inst-1", RecordPatch::new().release("lanky-seal", "apps"))
        .await
        .map_err(|e| format!("release: {e}"))?;

    let got = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;
    if got.service_id != original.service_id
        || got.plan_id != original.plan_id
        || got.provision_params != original.provision_params
    {
        return Err(format!("identity fields changed: {:?}", got));
    }
    if got.operation_name.as_deref() != Some("provision-7b")
        || got.operation_state != Some(OperationState::InProgress)
    {
        return Err(format!("operation fields lost by release update: {:?}", got));
    }
    Ok(())
}

async fn update_clear_removes_field<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .update(
            "inst-1",
            RecordPatch::new().begin_operation("provision-7b", "provisioning"),
        )
        .await
        .map_err(|e| format!("begin: {e}"))?;
    store
        .update("inst-1", RecordPatch::new().clear_operation())
        .await
        .map_err(|e| format!("clear: {e}"))?;

    let got = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;
    if got.operation_name.is_some()
        || got.operation_state.is_some()
        || got.operation_description.is_some()
    {
        return Err(format!("cleared fields still present: {:?}", got));
    }
    Ok(())
}

async fn update_returns_merged_record<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let returned = store
        .update(
            "inst-1",
            RecordPatch::new().operation_state(OperationState::Failed, "chart exploded"),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    let stored = store.get("inst-1").await.map_err(|e| format!("get: {e}"))?;

    if returned != stored {
        return Err(format!(
            "update returned {:?} but store holds {:?}",
            returned, stored
        ));
    }
    if stored.operation_description.as_deref() != Some("chart exploded") {
        return Err(format!("description not stored: {:?}", stored));
    }
    Ok(())
}

async fn update_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let result = store
        .update("ghost", RecordPatch::new().release("r", "ns"))
        .await;
    match result {
        Err(StorageError::NotFound { .. }) => {}
        other => return Err(format!("expected NotFound, got {:?}", other)),
    }
    // A failed update must not have created the record as a side effect.
    match store.get("ghost").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("update created a record: {:?}", other)),
    }
}
