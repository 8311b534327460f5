//! Conformance test suite for `InstanceStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `InstanceStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Creation**: reservation, read-back, duplicate detection
//! - **Update**: merge semantics, field clearing, missing-record errors
//! - **Deletion**: removal, repeated deletion, re-creation after removal
//! - **Concurrency**: racing creates for one instance ID have exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use minibroker_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn configmap_conformance() {
//!     let report = run_conformance_suite(|| async { make_configmap_store() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod create;
mod delete;
mod update;

use std::fmt;
use std::future::Future;

use crate::record::{InstanceRecord, ProvisionParams};
use crate::InstanceStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "create", "update", "concurrent").
    pub category: String,
    /// Test name (e.g. "duplicate_create_is_rejected").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: InstanceStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(create::run_create_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(delete::run_delete_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_record(instance_id: &str) -> InstanceRecord {
    let mut params = ProvisionParams::new();
    params.insert("persistence".to_string(), serde_json::json!({"size": "8Gi"}));
    params.insert("replicas".to_string(), serde_json::json!(1));
    InstanceRecord::new(instance_id, "mariadb", "mariadb-10-1-34", params)
}
