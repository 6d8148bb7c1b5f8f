//! Rule table for run classification

use crate::collector::{AggregateRun, Category, TestCaseResult};
use crate::config::{CriticalTagPredicate, EngineConfig};
use crate::coverage::CoverageEvaluation;
use crate::flake::FlakeClassification;
use crate::verdict::{Reason, ReasonTag, Verdict, VerdictLevel};
use serde::{Deserialize, Serialize};

/// Limits the classifier applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    pub timeout_ms: u64,
    pub warning_duration_ms: u64,
    pub flake_escalation_limit: u32,
    pub flaky_critical_escalates: bool,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for VerdictPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            warning_duration_ms: config.warning_duration_ms,
            flake_escalation_limit: config.flake_escalation_limit,
            flaky_critical_escalates: config.flaky_critical_escalates,
        }
    }
}

/// Everything one classification looks at
pub struct ClassifierInput<'a> {
    pub run: &'a AggregateRun,
    pub coverage: &'a CoverageEvaluation,
    pub flaky: &'a FlakeClassification,
    pub critical: &'a dyn CriticalTagPredicate,
    /// Run duration; normally `run.duration_ms`
    pub duration_ms: u64,
}

/// Deterministic classifier; holds no state between runs
#[derive(Debug, Clone, Default)]
pub struct VerdictClassifier {
    policy: VerdictPolicy,
}

impl VerdictClassifier {
    pub fn new(policy: VerdictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &VerdictPolicy {
        &self.policy
    }

    pub fn classify(&self, input: &ClassifierInput<'_>) -> Verdict {
        let failures = self.failure_tier(input);
        if let Some(verdict) = Verdict::new(VerdictLevel::Failure, failures) {
            tracing::debug!(%verdict, "Failure tier triggered");
            return verdict;
        }

        let warnings = self.warning_tier(input);
        if let Some(verdict) = Verdict::new(VerdictLevel::Warning, warnings) {
            tracing::debug!(%verdict, "Warning tier triggered");
            return verdict;
        }

        Verdict::success()
    }

    fn failure_tier(&self, input: &ClassifierInput<'_>) -> Vec<Reason> {
        let mut reasons = Vec::new();
        let run = input.run;

        // Rule 1: run timeout, including cancelled categories
        let timed_out: Vec<String> = run
            .failures()
            .filter(|r| is_timeout(r))
            .map(|r| r.id().key())
            .collect();
        if input.duration_ms >= self.policy.timeout_ms || !timed_out.is_empty() {
            let detail = if input.duration_ms >= self.policy.timeout_ms {
                format!(
                    "run took {} (timeout {})",
                    format_ms(input.duration_ms),
                    format_ms(self.policy.timeout_ms)
                )
            } else {
                format!("{} category run(s) cancelled by timeout", timed_out.len())
            };
            reasons.push(Reason::new(ReasonTag::TimeoutExceeded, detail).with_tests(timed_out));
        }

        let candidates: Vec<&TestCaseResult> = run.failures().filter(|r| !is_timeout(r)).collect();
        let flaky = |r: &TestCaseResult| input.flaky.is_flaky(r.id());

        // Rule 2: critical failures outside E2E
        let critical: Vec<String> = candidates
            .iter()
            .filter(|r| r.category() != Category::E2e && input.critical.is_critical(r))
            .filter(|r| self.policy.flaky_critical_escalates || !flaky(r))
            .map(|r| r.id().key())
            .collect();
        if !critical.is_empty() {
            reasons.push(
                Reason::new(
                    ReasonTag::CriticalTestFailed,
                    format!("{} critical test(s) failed", critical.len()),
                )
                .with_tests(critical.clone()),
            );
        }

        // Rule 3: critical E2E failures, flaky or not
        let e2e_critical: Vec<String> = candidates
            .iter()
            .filter(|r| r.category() == Category::E2e && input.critical.is_critical(r))
            .map(|r| r.id().key())
            .collect();
        if !e2e_critical.is_empty() {
            reasons.push(
                Reason::new(
                    ReasonTag::E2eCriticalFailed,
                    format!("{} critical E2E test(s) failed", e2e_critical.len()),
                )
                .with_tests(e2e_critical.clone()),
            );
        }

        // Rule 4: only when neither critical rule fired
        if critical.is_empty() && e2e_critical.is_empty() {
            let failed: Vec<String> = candidates
                .iter()
                .filter(|r| !flaky(r))
                .map(|r| r.id().key())
                .collect();
            if !failed.is_empty() {
                reasons.push(
                    Reason::new(
                        ReasonTag::TestFailed,
                        format!("{} test(s) failed", failed.len()),
                    )
                    .with_tests(failed),
                );
            }
        }

        // Rule 5: coverage below minimum
        let below: Vec<String> = input
            .coverage
            .below_minimum()
            .map(|m| format!("{} {:.1}% < {:.1}%", m.metric, m.value, m.minimum))
            .collect();
        if !below.is_empty() {
            reasons.push(Reason::new(
                ReasonTag::CoverageBelowThreshold,
                below.join(", "),
            ));
        }

        let flaky_count = input.flaky.count();
        if flaky_count > self.policy.flake_escalation_limit as usize {
            reasons.push(
                Reason::new(
                    ReasonTag::FlakyThresholdExceeded,
                    format!(
                        "{} flaky tests exceed the limit of {}",
                        flaky_count, self.policy.flake_escalation_limit
                    ),
                )
                .with_tests(input.flaky.flaky.iter().cloned().collect()),
            );
        }

        reasons
    }

    fn warning_tier(&self, input: &ClassifierInput<'_>) -> Vec<Reason> {
        let mut reasons = Vec::new();

        let below_target: Vec<String> = input
            .coverage
            .below_target()
            .map(|m| format!("{} {:.1}% < target {:.1}%", m.metric, m.value, m.target))
            .collect();
        if !below_target.is_empty() {
            reasons.push(Reason::new(
                ReasonTag::CoverageBelowTarget,
                below_target.join(", "),
            ));
        }

        let flaky_count = input.flaky.count();
        if flaky_count > 0 && flaky_count <= self.policy.flake_escalation_limit as usize {
            reasons.push(
                Reason::new(
                    ReasonTag::FlakyTestsDetected,
                    format!("{flaky_count} flaky test(s) detected"),
                )
                .with_tests(input.flaky.flaky.iter().cloned().collect()),
            );
        }

        if input.duration_ms > self.policy.warning_duration_ms {
            reasons.push(Reason::new(
                ReasonTag::DurationWarning,
                format!(
                    "run took {} (warning above {})",
                    format_ms(input.duration_ms),
                    format_ms(self.policy.warning_duration_ms)
                ),
            ));
        }

        reasons
    }
}

fn is_timeout(result: &TestCaseResult) -> bool {
    result.outcome().is_failed() && result.is_cancelled()
}

/// `31m 0s` style durations for reason details
pub(crate) fn format_ms(ms: u64) -> String {
    let secs = ms / 1000;
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{}s", secs, (ms % 1000) / 100)
    } else {
        format!("{ms}ms")
    }
}
