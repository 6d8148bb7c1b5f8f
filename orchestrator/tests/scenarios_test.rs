//! End-to-end classification scenarios
//!
//! Each scenario drives the full engine (collect → coverage → flake →
//! verdict → escalation → report) from synthetic runner summaries and a
//! synthetic persisted history.

use chrono::{TimeZone, Utc};
use test_orchestrator::{
    Category, CoverageMetrics, EngineConfig, EvaluationInput, FailureDetail, FlakeHistory,
    FlakeRecord, ProjectState, ReasonTag, RunSummary, Severity, StateKey, TestCaseResult,
    TestOrchestrator, TestOutcome, VerdictLevel,
};

fn started() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap()
}

/// `count` passing tests in one category
fn passing(category: Category, file: &str, count: usize) -> Vec<TestCaseResult> {
    (0..count)
        .map(|i| TestCaseResult::passed(category, file, &format!("case {i}")))
        .collect()
}

fn summary(category: Category, duration_ms: u64, results: Vec<TestCaseResult>) -> RunSummary {
    RunSummary::new(category, started(), duration_ms, results)
}

fn input(summaries: Vec<RunSummary>, coverage: CoverageMetrics) -> EvaluationInput {
    EvaluationInput {
        key: StateKey::new("storefront", "main"),
        summaries,
        coverage: Some(coverage),
    }
}

fn healthy_coverage() -> CoverageMetrics {
    CoverageMetrics::new(85.3, 81.2, 87.1, 85.7).unwrap()
}

/// History in which `key` has already seen the given outcomes
fn history_with(keys: &[&str], outcomes: &[TestOutcome]) -> ProjectState {
    let mut history = FlakeHistory::default();
    for key in keys {
        let mut record = FlakeRecord::default();
        for outcome in outcomes {
            record.push(*outcome, 10);
        }
        history.records.insert(key.to_string(), record);
    }
    ProjectState {
        flake_history: history,
        ..Default::default()
    }
}

fn engine() -> TestOrchestrator {
    TestOrchestrator::from_config(EngineConfig::default()).unwrap()
}

#[test]
fn scenario_a_all_green_is_success() {
    let summaries = vec![
        summary(Category::Unit, 40_000, passing(Category::Unit, "src/cart.test.ts", 100)),
        summary(
            Category::Integration,
            90_000,
            passing(Category::Integration, "tests/api.test.ts", 20),
        ),
        summary(Category::E2e, 120_000, passing(Category::E2e, "e2e/checkout.spec.ts", 7)),
    ];

    let eval = engine()
        .evaluate(input(summaries, healthy_coverage()), ProjectState::default())
        .unwrap();

    assert_eq!(eval.run.total, 127);
    assert_eq!(eval.run.passed, 127);
    assert_eq!(eval.verdict.level(), VerdictLevel::Success);
    assert!(eval.verdict.reasons().is_empty());
    assert!(!eval.decision.notify);
    assert_eq!(eval.decision.severity, Severity::None);
    assert!(eval.report.recommended_actions.is_empty());
    assert!(eval.report.coverage.iter().all(|c| c.passed));
}

#[test]
fn scenario_b_critical_failure_and_low_coverage() {
    let mut unit = passing(Category::Unit, "src/cart.test.ts", 124);
    unit.push(
        TestCaseResult::failed(
            Category::Unit,
            "src/auth/login.test.ts",
            "rejects expired token",
            FailureDetail::new("expected 401")
                .with_values("401", "200")
                .at("src/auth/login.test.ts", 57),
        )
        .with_tags(["critical"]),
    );
    unit.push(TestCaseResult::failed(
        Category::Unit,
        "src/search.test.ts",
        "debounces input",
        FailureDetail::new("timer fired twice"),
    ));
    unit.push(TestCaseResult::failed(
        Category::Unit,
        "src/toast.test.ts",
        "auto dismisses",
        FailureDetail::new("element still visible"),
    ));

    let coverage = CoverageMetrics::new(78.5, 81.2, 87.1, 85.7).unwrap();
    let eval = engine()
        .evaluate(
            input(vec![summary(Category::Unit, 60_000, unit)], coverage),
            ProjectState::default(),
        )
        .unwrap();

    assert_eq!(eval.run.total, 127);
    assert_eq!(eval.run.passed, 124);
    assert_eq!(eval.run.failed, 3);
    assert_eq!(eval.verdict.level(), VerdictLevel::Failure);
    assert_eq!(
        eval.verdict.tags(),
        vec![ReasonTag::CriticalTestFailed, ReasonTag::CoverageBelowThreshold]
    );
    assert_eq!(
        eval.verdict.reasons()[0].tests,
        vec!["unit::src/auth/login.test.ts::rejects expired token"]
    );

    assert!(eval.decision.notify);
    assert_eq!(eval.decision.severity, Severity::High);
    assert!(eval.decision.has_trigger(ReasonTag::CriticalTestFailed));

    let login = eval
        .report
        .failures
        .iter()
        .find(|f| f.file == "src/auth/login.test.ts")
        .unwrap();
    assert!(login.critical);
    assert_eq!(login.line, Some(57));
    assert_eq!(eval.report.failures.len(), 3);
    assert!(eval.report.failures.iter().all(|f| !f.flaky));
    assert!(eval.flaky.flaky.is_empty());
    assert!(eval
        .report
        .recommended_actions
        .contains(&"increase coverage for uncovered code".to_string()));
}

#[test]
fn scenario_c_alternating_test_is_warning() {
    let key = "unit::src/clock.test.ts::formats midnight";
    let state = history_with(
        &[key],
        &[TestOutcome::Passed, TestOutcome::Failed, TestOutcome::Passed],
    );

    let mut results = passing(Category::Unit, "src/cart.test.ts", 10);
    results.push(TestCaseResult::failed(
        Category::Unit,
        "src/clock.test.ts",
        "formats midnight",
        FailureDetail::new("expected 00:00"),
    ));

    let eval = engine()
        .evaluate(
            input(vec![summary(Category::Unit, 5_000, results)], healthy_coverage()),
            state,
        )
        .unwrap();

    let record = eval.state.flake_history.get(key).unwrap();
    assert_eq!(record.pattern(), "PFPF");
    assert_eq!(record.flake_count(), 3);
    assert!(eval.flaky.flaky.contains(key));

    assert_eq!(eval.verdict.level(), VerdictLevel::Warning);
    assert_eq!(eval.verdict.tags(), vec![ReasonTag::FlakyTestsDetected]);
    assert_eq!(eval.decision.severity, Severity::Normal);
}

#[test]
fn scenario_c_consistent_failure_is_not_downgraded() {
    let key = "unit::src/clock.test.ts::formats midnight";
    let state = history_with(&[key], &[TestOutcome::Failed; 9]);

    let results = vec![TestCaseResult::failed(
        Category::Unit,
        "src/clock.test.ts",
        "formats midnight",
        FailureDetail::new("expected 00:00"),
    )];
    let eval = engine()
        .evaluate(
            input(vec![summary(Category::Unit, 5_000, results)], healthy_coverage()),
            state,
        )
        .unwrap();

    assert_eq!(eval.verdict.tags(), vec![ReasonTag::TestFailed]);
}

#[test]
fn scenario_d_e2e_total_failure() {
    let e2e = (0..5)
        .map(|i| {
            TestCaseResult::failed(
                Category::E2e,
                "e2e/checkout.spec.ts",
                &format!("step {i}"),
                FailureDetail::new("locator '#pay' not found"),
            )
        })
        .collect();
    let summaries = vec![
        summary(Category::Unit, 10_000, passing(Category::Unit, "src/cart.test.ts", 50)),
        summary(
            Category::Integration,
            20_000,
            passing(Category::Integration, "tests/api.test.ts", 10),
        ),
        summary(Category::E2e, 30_000, e2e),
    ];

    let eval = engine()
        .evaluate(input(summaries, healthy_coverage()), ProjectState::default())
        .unwrap();

    assert_eq!(eval.verdict.level(), VerdictLevel::Failure);
    assert!(eval.verdict.has(ReasonTag::TestFailed));
    assert!(eval.decision.has_trigger(ReasonTag::E2eTotalFailure));
    assert_eq!(eval.decision.severity, Severity::High);
    assert!(eval
        .report
        .recommended_actions
        .contains(&"check E2E environment/selectors".to_string()));
}

#[test]
fn scenario_e_timeout_overrides_everything_else() {
    let summaries = vec![summary(
        Category::Unit,
        31 * 60 * 1000,
        passing(Category::Unit, "src/cart.test.ts", 30),
    )];
    // Over the warning duration as well; lower tiers are not reported
    let eval = engine()
        .evaluate(input(summaries, healthy_coverage()), ProjectState::default())
        .unwrap();

    assert_eq!(eval.run.duration_ms, 31 * 60 * 1000);
    assert_eq!(eval.verdict.level(), VerdictLevel::Failure);
    assert_eq!(eval.verdict.tags(), vec![ReasonTag::TimeoutExceeded]);
    assert!(!eval.verdict.has(ReasonTag::DurationWarning));
}

#[test]
fn recurrent_flaky_test_escalates_high_on_third_flagged_run() {
    let engine = engine();
    let key = "unit::src/clock.test.ts::formats midnight";
    let mut state = history_with(
        &[key],
        &[TestOutcome::Passed, TestOutcome::Failed, TestOutcome::Passed],
    );

    // Every run keeps the window alternating, so each one is flagged
    let outcomes = [TestOutcome::Failed, TestOutcome::Passed, TestOutcome::Failed];
    let mut last = None;
    for outcome in outcomes {
        let result = match outcome {
            TestOutcome::Failed => TestCaseResult::failed(
                Category::Unit,
                "src/clock.test.ts",
                "formats midnight",
                FailureDetail::new("expected 00:00"),
            ),
            _ => TestCaseResult::passed(Category::Unit, "src/clock.test.ts", "formats midnight"),
        };
        let eval = engine
            .evaluate(
                input(vec![summary(Category::Unit, 1_000, vec![result])], healthy_coverage()),
                state,
            )
            .unwrap();
        state = eval.state.clone();
        last = Some(eval);
    }

    let eval = last.unwrap();
    assert_eq!(eval.state.flake_history.get(key).unwrap().flagged_runs, 3);
    assert!(eval.decision.has_trigger(ReasonTag::RecurrentFlakyTest));
    assert_eq!(eval.decision.severity, Severity::High);
}
