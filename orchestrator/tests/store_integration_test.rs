//! Integration tests for persisted state
//!
//! Drives the engine across several invocations against a JSON file store
//! and checks that read-modify-write updates are not lost under contention.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use test_orchestrator::{
    Category, CoverageMetrics, EngineConfig, EvaluationInput, FailureDetail, HistoryStore,
    JsonFileStore, ProjectState, ReasonTag, RunSummary, StateKey, TestCaseResult,
    TestOrchestrator, VerdictLevel,
};

fn run_once(
    engine: &TestOrchestrator,
    store: &JsonFileStore,
    key: &StateKey,
    pass: bool,
    coverage: f64,
) -> test_orchestrator::Evaluation {
    let result = if pass {
        TestCaseResult::passed(Category::Unit, "src/retry.test.ts", "backs off")
    } else {
        TestCaseResult::failed(
            Category::Unit,
            "src/retry.test.ts",
            "backs off",
            FailureDetail::new("retried 4 times"),
        )
    };
    engine
        .evaluate_with_store(
            store,
            EvaluationInput {
                key: key.clone(),
                summaries: vec![RunSummary::new(Category::Unit, Utc::now(), 1_000, vec![result])],
                coverage: Some(CoverageMetrics::new(coverage, coverage, coverage, coverage).unwrap()),
            },
        )
        .unwrap()
}

#[test]
fn test_history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TestOrchestrator::from_config(EngineConfig::default()).unwrap();
    let key = StateKey::new("payments", "release/2.1");

    for pass in [true, false, true] {
        let store = JsonFileStore::new(dir.path());
        run_once(&engine, &store, &key, pass, 90.0);
    }

    // Fourth run flips again: P F P F has three alternations
    let store = JsonFileStore::new(dir.path());
    let eval = run_once(&engine, &store, &key, false, 90.0);
    assert_eq!(eval.verdict.level(), VerdictLevel::Warning);
    assert_eq!(eval.verdict.tags(), vec![ReasonTag::FlakyTestsDetected]);

    let state = store.load(&key).unwrap();
    assert_eq!(state.runs_recorded, 4);
    let record = state
        .flake_history
        .get("unit::src/retry.test.ts::backs off")
        .unwrap();
    assert_eq!(record.pattern(), "PFPF");
    assert_eq!(record.flagged_runs, 1);
}

#[test]
fn test_branches_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TestOrchestrator::from_config(EngineConfig::default()).unwrap();
    let store = JsonFileStore::new(dir.path());

    let main = StateKey::new("payments", "main");
    let feature = StateKey::new("payments", "feature/refunds");
    run_once(&engine, &store, &main, true, 99.0);

    // No prior for the feature branch, so no delta and no regression
    let eval = run_once(&engine, &store, &feature, true, 85.0);
    assert!(eval.coverage.metrics.iter().all(|m| m.delta.is_none()));
    assert_eq!(store.load(&main).unwrap().runs_recorded, 1);
    assert_eq!(store.load(&feature).unwrap().runs_recorded, 1);
}

#[test]
fn test_coverage_regression_escalates_against_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let engine = TestOrchestrator::from_config(EngineConfig::default()).unwrap();
    let store = JsonFileStore::new(dir.path());
    let key = StateKey::new("payments", "main");

    run_once(&engine, &store, &key, true, 95.0);
    // Failing run with a 12-point drop
    let eval = run_once(&engine, &store, &key, false, 83.0);
    assert_eq!(eval.verdict.level(), VerdictLevel::Failure);
    assert!(eval.decision.has_trigger(ReasonTag::CoverageRegression));
    assert!(eval.decision.is_high());
}

#[test]
fn test_concurrent_updates_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let key = StateKey::new("payments", "main");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let key = key.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    store
                        .update(&key, &mut |state: &mut ProjectState| {
                            state.runs_recorded += 1;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.load(&key).unwrap().runs_recorded, 80);
}
