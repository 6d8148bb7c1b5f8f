//! Report value handed to the caller
//!
//! Presentation only: the report restates the verdict and escalation, it
//! never alters them. Routing (terminal, PR comment, ticket body) is the
//! caller's concern.

pub mod render;

pub use render::{ReportContext, ReportRenderer};

use crate::collector::Category;
use crate::coverage::{Metric, MetricStatus};
use crate::escalation::EscalationDecision;
use crate::verdict::{Reason, VerdictLevel};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Run-wide counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Counts for one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryLine {
    pub category: Category,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

/// One failed test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailureLine {
    pub category: Category,
    pub file: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub critical: bool,
    pub flaky: bool,
}

/// One coverage metric with its pass/fail marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageLine {
    pub metric: Metric,
    pub value: f64,
    pub minimum: f64,
    pub target: f64,
    pub status: MetricStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    /// At or above the minimum
    pub passed: bool,
}

/// Structured report for one evaluated run
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Report {
    pub project: String,
    pub branch: String,
    pub run_id: String,
    /// Earliest category start; taken from the run, never from the clock
    pub started_at: Option<DateTime<Utc>>,
    pub counts: ReportCounts,
    pub categories: Vec<CategoryLine>,
    pub failures: Vec<FailureLine>,
    pub coverage: Vec<CoverageLine>,
    pub verdict: VerdictLevel,
    pub reasons: Vec<Reason>,
    pub escalation: EscalationDecision,
    pub recommended_actions: Vec<String>,
    /// blake3 of the canonical JSON of every other field
    pub digest: String,
}

impl Report {
    /// One line for terminals and logs
    pub fn summary(&self) -> String {
        let tags: Vec<&str> = self.reasons.iter().map(|r| r.tag.as_str()).collect();
        format!(
            "[{}] {}/{} passed, {} failed, {} skipped ({}ms){}{}",
            self.verdict,
            self.counts.passed,
            self.counts.total,
            self.counts.failed,
            self.counts.skipped,
            self.counts.duration_ms,
            if tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tags.join(", "))
            },
            if self.escalation.notify {
                format!(" escalation={}", self.escalation.severity)
            } else {
                String::new()
            }
        )
    }

    /// Markdown body for PR comments and tickets
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let icon = match self.verdict {
            VerdictLevel::Success => "✅",
            VerdictLevel::Warning => "⚠️",
            VerdictLevel::Failure => "❌",
        };
        let _ = writeln!(md, "## {icon} Test run {}: {}", self.verdict, self.project);
        let _ = writeln!(md);
        let _ = writeln!(
            md,
            "Branch `{}` · run `{}` · {} ms",
            self.branch, self.run_id, self.counts.duration_ms
        );
        let _ = writeln!(md);

        let _ = writeln!(md, "| Category | Total | Passed | Failed | Skipped |");
        let _ = writeln!(md, "|---|---:|---:|---:|---:|");
        for line in &self.categories {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                line.category, line.total, line.passed, line.failed, line.skipped
            );
        }
        let _ = writeln!(
            md,
            "| **all** | {} | {} | {} | {} |",
            self.counts.total, self.counts.passed, self.counts.failed, self.counts.skipped
        );

        if !self.coverage.is_empty() {
            let _ = writeln!(md);
            let _ = writeln!(md, "### Coverage");
            let _ = writeln!(md);
            let _ = writeln!(md, "| Metric | Value | Minimum | Target | Δ | |");
            let _ = writeln!(md, "|---|---:|---:|---:|---:|---|");
            for line in &self.coverage {
                let delta = line
                    .delta
                    .map(|d| format!("{d:+.2}"))
                    .unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(
                    md,
                    "| {} | {:.1}% | {:.1}% | {:.1}% | {} | {} |",
                    line.metric,
                    line.value,
                    line.minimum,
                    line.target,
                    delta,
                    if line.passed { "✅" } else { "❌" }
                );
            }
        }

        if !self.failures.is_empty() {
            let _ = writeln!(md);
            let _ = writeln!(md, "### Failures");
            let _ = writeln!(md);
            for failure in &self.failures {
                let location = match failure.line {
                    Some(line) => format!("{}:{}", failure.file, line),
                    None => failure.file.clone(),
                };
                let mut marks = Vec::new();
                if failure.critical {
                    marks.push("critical");
                }
                if failure.flaky {
                    marks.push("flaky");
                }
                let marks = if marks.is_empty() {
                    String::new()
                } else {
                    format!(" _({})_", marks.join(", "))
                };
                let _ = writeln!(md, "- **{}** `{}`{}", failure.name, location, marks);
                let _ = writeln!(md, "  - {}", failure.message);
                if let (Some(expected), Some(actual)) = (&failure.expected, &failure.actual) {
                    let _ = writeln!(md, "  - expected `{expected}`, got `{actual}`");
                }
            }
        }

        if !self.reasons.is_empty() {
            let _ = writeln!(md);
            let _ = writeln!(md, "### Reasons");
            let _ = writeln!(md);
            for reason in &self.reasons {
                let _ = writeln!(md, "- `{}`: {}", reason.tag, reason.detail);
            }
        }

        if !self.recommended_actions.is_empty() {
            let _ = writeln!(md);
            let _ = writeln!(md, "### Recommended actions");
            let _ = writeln!(md);
            for action in &self.recommended_actions {
                let _ = writeln!(md, "- [ ] {action}");
            }
        }

        if self.escalation.notify {
            let _ = writeln!(md);
            let _ = writeln!(
                md,
                "> Escalated to a human operator ({} severity)",
                self.escalation.severity
            );
        }

        md
    }
}
