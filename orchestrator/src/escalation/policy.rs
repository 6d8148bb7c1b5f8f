//! Escalation rules
//!
//! High severity: critical failures, a coverage drop of at least
//! `coverage_drop_escalation` points on any metric, tests flagged flaky in
//! `flaky_run_escalation` distinct runs, or every attempted E2E test failing.
//! Any other non-SUCCESS verdict notifies with normal severity. SUCCESS never
//! notifies.

use crate::collector::{AggregateRun, Category};
use crate::config::EngineConfig;
use crate::coverage::CoverageEvaluation;
use crate::escalation::{EscalationDecision, EscalationTrigger, Severity};
use crate::flake::FlakeClassification;
use crate::verdict::{ReasonTag, Verdict, VerdictLevel};
use serde::{Deserialize, Serialize};

/// Historical context for one decision
pub struct EscalationContext<'a> {
    pub run: &'a AggregateRun,
    /// Carries deltas against the prior stored run
    pub coverage: &'a CoverageEvaluation,
    pub flaky: &'a FlakeClassification,
}

/// Escalation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Percentage-point drop on any metric that escalates
    pub coverage_drop: f64,
    /// Distinct flagged runs after which a flaky test escalates
    pub flaky_runs: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EscalationPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            coverage_drop: config.coverage_drop_escalation,
            flaky_runs: config.flaky_run_escalation,
        }
    }
}

impl EscalationPolicy {
    pub fn decide(&self, verdict: &Verdict, ctx: &EscalationContext<'_>) -> EscalationDecision {
        if verdict.level() == VerdictLevel::Success {
            return EscalationDecision::none();
        }

        let triggers = self.high_triggers(verdict, ctx);
        let (severity, triggers) = if triggers.is_empty() {
            let normal = verdict
                .reasons()
                .iter()
                .map(|r| EscalationTrigger::new(r.tag, r.detail.clone()))
                .collect();
            (Severity::Normal, normal)
        } else {
            (Severity::High, triggers)
        };

        let message = render_message(verdict, severity, &triggers);
        let decision = EscalationDecision {
            notify: true,
            severity,
            triggers,
            message,
        };

        tracing::info!(
            run_id = %ctx.run.run_id,
            verdict = %verdict.level(),
            severity = %decision.severity,
            triggers = decision.triggers.len(),
            "Escalation decided"
        );
        decision
    }

    fn high_triggers(&self, verdict: &Verdict, ctx: &EscalationContext<'_>) -> Vec<EscalationTrigger> {
        let mut triggers = Vec::new();

        if verdict.is_failure() {
            for tag in [ReasonTag::CriticalTestFailed, ReasonTag::E2eCriticalFailed] {
                if let Some(reason) = verdict.reasons().iter().find(|r| r.tag == tag) {
                    triggers.push(EscalationTrigger::new(tag, reason.detail.clone()));
                }
            }
        }

        let drops: Vec<String> = ctx
            .coverage
            .metrics
            .iter()
            .filter_map(|m| {
                m.delta
                    .filter(|d| -d >= self.coverage_drop)
                    .map(|d| format!("{} dropped {:.1} points", m.metric, -d))
            })
            .collect();
        if !drops.is_empty() {
            triggers.push(EscalationTrigger::new(
                ReasonTag::CoverageRegression,
                drops.join(", "),
            ));
        }

        let recurrent = ctx.flaky.recurrent(self.flaky_runs);
        if !recurrent.is_empty() {
            triggers.push(EscalationTrigger::new(
                ReasonTag::RecurrentFlakyTest,
                format!(
                    "flaky in {}+ runs: {}",
                    self.flaky_runs,
                    recurrent.join(", ")
                ),
            ));
        }

        if let Some(e2e) = ctx.run.totals(Category::E2e) {
            if e2e.all_attempted_failed() {
                triggers.push(EscalationTrigger::new(
                    ReasonTag::E2eTotalFailure,
                    format!(
                        "all {} attempted E2E tests failed; likely an environment failure",
                        e2e.attempted()
                    ),
                ));
            }
        }

        triggers
    }
}

fn render_message(verdict: &Verdict, severity: Severity, triggers: &[EscalationTrigger]) -> String {
    let mut message = format!("{verdict}: escalating with {severity} severity");
    for trigger in triggers {
        message.push_str(&format!("\n- {}: {}", trigger.tag, trigger.detail));
    }
    message
}
