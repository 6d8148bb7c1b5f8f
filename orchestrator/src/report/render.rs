//! Deterministic report rendering

use crate::collector::AggregateRun;
use crate::config::CriticalTagPredicate;
use crate::coverage::{CoverageEvaluation, MetricStatus};
use crate::escalation::EscalationDecision;
use crate::flake::FlakeClassification;
use crate::report::{CategoryLine, CoverageLine, FailureLine, Report, ReportCounts};
use crate::verdict::Verdict;

/// Inputs to one render
pub struct ReportContext<'a> {
    pub project: &'a str,
    pub branch: &'a str,
    pub run: &'a AggregateRun,
    pub coverage: &'a CoverageEvaluation,
    pub verdict: &'a Verdict,
    pub decision: &'a EscalationDecision,
    pub critical: &'a dyn CriticalTagPredicate,
    pub flaky: &'a FlakeClassification,
}

/// Builds [`Report`] values; same inputs, same report
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn render(&self, ctx: &ReportContext<'_>) -> Report {
        let run = ctx.run;

        let categories = run
            .per_category
            .iter()
            .map(|(category, totals)| CategoryLine {
                category: *category,
                total: totals.total,
                passed: totals.passed,
                failed: totals.failed,
                skipped: totals.skipped,
                duration_ms: totals.duration_ms,
            })
            .collect();

        let failures = run
            .failures()
            .map(|result| {
                let detail = result.failure();
                FailureLine {
                    category: result.category(),
                    file: result.id().file.clone(),
                    name: result.id().name.clone(),
                    line: detail.and_then(|d| d.location.as_ref()).map(|l| l.line),
                    message: detail
                        .map(|d| d.message.clone())
                        .unwrap_or_else(|| "test failed".to_string()),
                    expected: detail.and_then(|d| d.expected.clone()),
                    actual: detail.and_then(|d| d.actual.clone()),
                    critical: ctx.critical.is_critical(result),
                    flaky: ctx.flaky.is_flaky(result.id()),
                }
            })
            .collect();

        let coverage = ctx
            .coverage
            .metrics
            .iter()
            .map(|m| CoverageLine {
                metric: m.metric,
                value: m.value,
                minimum: m.minimum,
                target: m.target,
                status: m.status,
                delta: m.delta,
                passed: m.status != MetricStatus::BelowMinimum,
            })
            .collect();

        let mut report = Report {
            project: ctx.project.to_string(),
            branch: ctx.branch.to_string(),
            run_id: run.run_id.to_string(),
            started_at: run.started_at,
            counts: ReportCounts {
                total: run.total,
                passed: run.passed,
                failed: run.failed,
                skipped: run.skipped,
                duration_ms: run.duration_ms,
            },
            categories,
            failures,
            coverage,
            verdict: ctx.verdict.level(),
            reasons: ctx.verdict.reasons().to_vec(),
            escalation: ctx.decision.clone(),
            recommended_actions: recommended_actions(ctx.verdict, ctx.decision),
            digest: String::new(),
        };
        report.digest = digest(&report);
        report
    }
}

/// Verdict reasons first, then escalation triggers, each action once
fn recommended_actions(verdict: &Verdict, decision: &EscalationDecision) -> Vec<String> {
    let tags = verdict
        .reasons()
        .iter()
        .map(|r| r.tag)
        .chain(decision.triggers.iter().map(|t| t.tag));

    let mut actions: Vec<String> = Vec::new();
    for tag in tags {
        let action = tag.recommended_action();
        if !actions.iter().any(|a| a == action) {
            actions.push(action.to_string());
        }
    }
    actions
}

/// blake3 over the report's JSON with an empty digest field
fn digest(report: &Report) -> String {
    let bytes = serde_json::to_vec(report).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
