//! Verdict classifier
//!
//! Combines the aggregate run, coverage evaluation and flake classification
//! into one of SUCCESS, WARNING or FAILURE. Rules are grouped into tiers; the
//! first tier with a triggered rule decides the level and every triggered
//! rule of that tier is reported.

pub mod classifier;

pub use classifier::{ClassifierInput, VerdictClassifier, VerdictPolicy};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictLevel {
    Success,
    Warning,
    Failure,
}

impl fmt::Display for VerdictLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Rule that contributed to a verdict or an escalation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonTag {
    TimeoutExceeded,
    CriticalTestFailed,
    E2eCriticalFailed,
    TestFailed,
    CoverageBelowThreshold,
    FlakyThresholdExceeded,
    CoverageBelowTarget,
    FlakyTestsDetected,
    DurationWarning,
    E2eTotalFailure,
    CoverageRegression,
    RecurrentFlakyTest,
}

impl ReasonTag {
    pub const ALL: [ReasonTag; 12] = [
        ReasonTag::TimeoutExceeded,
        ReasonTag::CriticalTestFailed,
        ReasonTag::E2eCriticalFailed,
        ReasonTag::TestFailed,
        ReasonTag::CoverageBelowThreshold,
        ReasonTag::FlakyThresholdExceeded,
        ReasonTag::CoverageBelowTarget,
        ReasonTag::FlakyTestsDetected,
        ReasonTag::DurationWarning,
        ReasonTag::E2eTotalFailure,
        ReasonTag::CoverageRegression,
        ReasonTag::RecurrentFlakyTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeoutExceeded => "timeout-exceeded",
            Self::CriticalTestFailed => "critical-test-failed",
            Self::E2eCriticalFailed => "e2e-critical-failed",
            Self::TestFailed => "test-failed",
            Self::CoverageBelowThreshold => "coverage-below-threshold",
            Self::FlakyThresholdExceeded => "flaky-threshold-exceeded",
            Self::CoverageBelowTarget => "coverage-below-target",
            Self::FlakyTestsDetected => "flaky-tests-detected",
            Self::DurationWarning => "duration-warning",
            Self::E2eTotalFailure => "e2e-total-failure",
            Self::CoverageRegression => "coverage-regression",
            Self::RecurrentFlakyTest => "recurrent-flaky-test",
        }
    }

    /// Level this tag forces when produced by the classifier
    ///
    /// Escalation-only tags return `None`.
    pub fn tier(&self) -> Option<VerdictLevel> {
        match self {
            Self::TimeoutExceeded
            | Self::CriticalTestFailed
            | Self::E2eCriticalFailed
            | Self::TestFailed
            | Self::CoverageBelowThreshold
            | Self::FlakyThresholdExceeded => Some(VerdictLevel::Failure),
            Self::CoverageBelowTarget | Self::FlakyTestsDetected | Self::DurationWarning => {
                Some(VerdictLevel::Warning)
            }
            Self::E2eTotalFailure | Self::CoverageRegression | Self::RecurrentFlakyTest => None,
        }
    }

    /// Fixed recommended action, one per tag
    pub fn recommended_action(&self) -> &'static str {
        match self {
            Self::TimeoutExceeded => "investigate hanging tests or raise the configured timeout",
            Self::CriticalTestFailed => "fix critical test failures before merging",
            Self::E2eCriticalFailed => "fix the failing critical end-to-end flows",
            Self::TestFailed => "fix failing tests",
            Self::CoverageBelowThreshold => "increase coverage for uncovered code",
            Self::FlakyThresholdExceeded => "stabilize or quarantine flaky tests",
            Self::CoverageBelowTarget => "add tests to reach the coverage target",
            Self::FlakyTestsDetected => "investigate flaky tests for non-determinism",
            Self::DurationWarning => "profile and speed up the slowest test suites",
            Self::E2eTotalFailure => "check E2E environment/selectors",
            Self::CoverageRegression => "review recent changes that reduced coverage",
            Self::RecurrentFlakyTest => "file a ticket to fix recurrently flaky tests",
        }
    }
}

impl fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contributing reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Reason {
    pub tag: ReasonTag,
    pub detail: String,
    /// Test keys involved, when the rule is about specific tests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
}

impl Reason {
    pub fn new(tag: ReasonTag, detail: impl Into<String>) -> Self {
        Self {
            tag,
            detail: detail.into(),
            tests: Vec::new(),
        }
    }

    pub fn with_tests(mut self, tests: Vec<String>) -> Self {
        self.tests = tests;
        self
    }
}

/// Classification plus the reasons behind it
///
/// Reasons are non-empty exactly when the level is not SUCCESS.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Verdict {
    level: VerdictLevel,
    reasons: Vec<Reason>,
}

impl Verdict {
    /// `None` when the reasons do not fit the level
    pub fn new(level: VerdictLevel, reasons: Vec<Reason>) -> Option<Self> {
        let consistent = match level {
            VerdictLevel::Success => reasons.is_empty(),
            _ => !reasons.is_empty(),
        };
        consistent.then_some(Self { level, reasons })
    }

    pub fn success() -> Self {
        Self {
            level: VerdictLevel::Success,
            reasons: Vec::new(),
        }
    }

    pub fn level(&self) -> VerdictLevel {
        self.level
    }

    pub fn reasons(&self) -> &[Reason] {
        &self.reasons
    }

    pub fn tags(&self) -> Vec<ReasonTag> {
        self.reasons.iter().map(|r| r.tag).collect()
    }

    pub fn has(&self, tag: ReasonTag) -> bool {
        self.reasons.iter().any(|r| r.tag == tag)
    }

    pub fn is_failure(&self) -> bool {
        self.level == VerdictLevel::Failure
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level)?;
        if !self.reasons.is_empty() {
            let tags: Vec<&str> = self.reasons.iter().map(|r| r.tag.as_str()).collect();
            write!(f, " [{}]", tags.join(", "))?;
        }
        Ok(())
    }
}
