//! Property tests: randomized validation of flake, coverage and verdict
//! invariants across generated inputs.
//!
//! Tests verify:
//! - Flake windows never exceed their size and evict at most one entry per push
//! - A test that never passed is never classified flaky
//! - A metric exactly at its minimum is never below-minimum
//! - Verdict reasons are non-empty exactly when the verdict is not SUCCESS

use chrono::Utc;
use test_orchestrator::collector::collect;
use test_orchestrator::coverage::evaluate;
use test_orchestrator::verdict::ClassifierInput;
use test_orchestrator::{
    Category, CoverageMetrics, CoverageThresholds, ExecutionPlan, FailureDetail,
    FlakeClassification, FlakeHistory, FlakeRecord, FlakeSettings, FlakeTracker, Metric,
    MetricStatus, MetricThreshold, RunSummary, TestCaseResult, TestId, TestOutcome,
    VerdictClassifier, VerdictLevel, VerdictPolicy,
};

/// Deterministic xorshift generator so failures reproduce.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }

    fn outcome(&mut self) -> TestOutcome {
        match self.below(3) {
            0 => TestOutcome::Passed,
            1 => TestOutcome::Failed,
            _ => TestOutcome::Skipped,
        }
    }

    fn percent(&mut self) -> f64 {
        self.below(10_001) as f64 / 100.0
    }
}

// ── Property: the window is bounded and evicts oldest first ─────────

#[test]
fn prop_window_never_exceeds_size() {
    let mut rng = Rng(0x9e37_79b9_7f4a_7c15);
    for window in 1..=12usize {
        let mut record = FlakeRecord::default();
        for step in 0..60 {
            let before: Vec<TestOutcome> = record.outcomes.iter().copied().collect();
            let outcome = rng.outcome();
            record.push(outcome, window);

            assert!(
                record.outcomes.len() <= window,
                "window={}, step={}: len {}",
                window,
                step,
                record.outcomes.len()
            );
            assert_eq!(record.last(), Some(outcome));

            // Everything but the newest entry is a suffix of the previous window
            let kept: Vec<TestOutcome> =
                record.outcomes.iter().take(record.outcomes.len() - 1).copied().collect();
            let dropped = before.len() + 1 - record.outcomes.len();
            assert!(dropped <= 1, "window={}, step={}: dropped {}", window, step, dropped);
            assert_eq!(kept, before[dropped..].to_vec());
        }
    }
}

// ── Property: never-passing tests are never flaky ────────────────────

#[test]
fn prop_all_failing_history_never_flaky() {
    let id = TestId::new(Category::Integration, "tests/db.test.ts", "migrates");
    for window in 2..=15usize {
        for threshold in 1..=5u32 {
            let mut tracker =
                FlakeTracker::new(FlakeHistory::default(), FlakeSettings { window, threshold });
            for _ in 0..(window * 3) {
                tracker.record_outcome(&id, TestOutcome::Failed);
                assert!(
                    !tracker.is_flaky(&id),
                    "window={}, threshold={}",
                    window,
                    threshold
                );
            }
        }
    }
}

#[test]
fn prop_flaky_requires_pass_and_fail() {
    let mut rng = Rng(42);
    let id = TestId::new(Category::Unit, "src/a.test.ts", "x");
    for _ in 0..500 {
        let mut tracker = FlakeTracker::new(
            FlakeHistory::default(),
            FlakeSettings {
                window: 2 + rng.below(10) as usize,
                threshold: 1 + rng.below(4) as u32,
            },
        );
        for _ in 0..rng.below(30) {
            tracker.record_outcome(&id, rng.outcome());
        }
        if tracker.is_flaky(&id) {
            let record = tracker.history().get(&id.key()).unwrap();
            assert!(record.has_pass() && record.has_fail(), "{}", record.pattern());
            assert!(record.flake_count() >= tracker.settings().threshold);
        }
    }
}

// ── Property: the minimum is inclusive on the pass side ──────────────

#[test]
fn prop_exact_minimum_is_above_minimum() {
    let mut rng = Rng(7);
    for _ in 0..1_000 {
        let minimum = rng.percent();
        let target = minimum + (100.0 - minimum) * (rng.below(101) as f64 / 100.0);
        let threshold = MetricThreshold { target, minimum };

        let status = MetricStatus::classify(minimum, &threshold);
        assert_ne!(status, MetricStatus::BelowMinimum, "min={} target={}", minimum, target);

        if minimum >= 0.1 {
            let below = MetricStatus::classify(minimum - 0.1, &threshold);
            assert_eq!(below, MetricStatus::BelowMinimum, "min={}", minimum);
        }
    }

    let threshold = MetricThreshold {
        target: 80.0,
        minimum: 80.0,
    };
    assert_eq!(
        MetricStatus::classify(79.9, &threshold),
        MetricStatus::BelowMinimum
    );
    assert_eq!(
        MetricStatus::classify(80.0, &threshold),
        MetricStatus::MeetsTarget
    );
}

// ── Property: reasons non-empty iff not SUCCESS ───────────────────────

#[test]
fn prop_reasons_nonempty_iff_not_success() {
    let mut rng = Rng(0xdead_beef);
    let critical = |r: &TestCaseResult| r.has_tag("critical");

    for case in 0..400 {
        let mut summaries = Vec::new();
        for category in Category::ALL {
            if rng.below(4) == 0 {
                continue;
            }
            let results = (0..rng.below(8))
                .map(|i| {
                    let name = format!("t{i}");
                    let file = "spec.ts";
                    let result = match rng.outcome() {
                        TestOutcome::Passed => TestCaseResult::passed(category, file, &name),
                        TestOutcome::Failed => {
                            TestCaseResult::failed(category, file, &name, FailureDetail::new("x"))
                        }
                        TestOutcome::Skipped => TestCaseResult::skipped(category, file, &name),
                    };
                    if rng.below(5) == 0 {
                        result.with_tags(["critical"])
                    } else {
                        result
                    }
                })
                .collect();
            let duration = rng.below(40 * 60 * 1000);
            summaries.push(RunSummary::new(category, Utc::now(), duration, results));
        }
        let run = collect(summaries, &ExecutionPlan::default()).unwrap();

        let metrics = CoverageMetrics::new(
            rng.percent(),
            rng.percent(),
            rng.percent(),
            rng.percent(),
        )
        .unwrap();
        let thresholds = CoverageThresholds::uniform(MetricThreshold {
            target: 90.0,
            minimum: 70.0,
        });
        let coverage = evaluate(&metrics, None, &thresholds);

        let mut flaky = FlakeClassification::default();
        for result in run.results.iter() {
            if rng.below(6) == 0 {
                flaky.flaky.insert(result.id().key());
            }
        }

        let classifier = VerdictClassifier::new(VerdictPolicy {
            flaky_critical_escalates: rng.below(2) == 0,
            ..VerdictPolicy::default()
        });
        let verdict = classifier.classify(&ClassifierInput {
            run: &run,
            coverage: &coverage,
            flaky: &flaky,
            critical: &critical,
            duration_ms: run.duration_ms,
        });

        let success = verdict.level() == VerdictLevel::Success;
        assert_eq!(
            verdict.reasons().is_empty(),
            success,
            "case={}: {}",
            case,
            verdict
        );
        // Every reason belongs to the verdict's tier
        for reason in verdict.reasons() {
            assert_eq!(reason.tag.tier(), Some(verdict.level()), "case={}", case);
        }
        // SUCCESS means no coverage metric below target
        if success {
            assert!(Metric::ALL
                .iter()
                .all(|m| coverage.get(*m).unwrap().status == MetricStatus::MeetsTarget));
        }
    }
}
