use std::future::Future;
use std::sync::Arc;

use super::{make_record, TestResult};
use crate::{InstanceStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_create_exactly_one_wins",
            concurrent_create_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_create_different_ids_all_succeed",
            concurrent_create_different_ids_all_succeed(factory).await,
        ),
    ]
}

// ── Concurrent creation: exactly one wins ───────────────────────────────────

/// N tasks each attempt to create the same instance record, each with a
/// different plan. Exactly one succeeds; the rest must get AlreadyExists,
/// and the stored record must be the winner's.
async fn concurrent_create_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            let mut record = make_record("inst-race");
            record.plan_id = format!("plan-{i}");
            match s.create(record).await {
                Ok(()) => Ok(Some(i)),
                Err(e) if e.is_already_exists() => Ok(None),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = Vec::new();
    let mut losers = 0usize;
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        match outcome {
            Some(i) => winners.push(i),
            None => losers += 1,
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let stored = store
        .get("inst-race")
        .await
        .map_err(|e| format!("get: {e}"))?;
    let expected_plan = format!("plan-{}", winners[0]);
    if stored.plan_id != expected_plan {
        return Err(format!(
            "stored record is not the winner's: expected {expected_plan}, got {}",
            stored.plan_id
        ));
    }

    Ok(())
}

// ── Concurrent creation of distinct IDs ─────────────────────────────────────

async fn concurrent_create_different_ids_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.create(make_record(&format!("inst-{i}"))).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("create failed: {e}"))?;
    }

    for i in 0..N {
        store
            .get(&format!("inst-{i}"))
            .await
            .map_err(|e| format!("get inst-{i}: {e}"))?;
    }

    Ok(())
}
