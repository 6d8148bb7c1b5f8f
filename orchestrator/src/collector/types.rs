//! Test result data model
//!
//! Normalized types are immutable after construction: fields are private and
//! exposed through accessors. Raw runner types mirror the JSON that runners
//! emit and are deliberately permissive.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Test suite category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Unit,
    Integration,
    #[serde(alias = "E2E", alias = "end_to_end")]
    E2e,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Unit, Category::Integration, Category::E2e];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Integration => "integration",
            Self::E2e => "e2e",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" => Ok(Self::Unit),
            "integration" => Ok(Self::Integration),
            "e2e" | "end_to_end" | "end-to-end" => Ok(Self::E2e),
            other => Err(format!("unknown test category: {other}")),
        }
    }
}

/// Stable identity of a test case across runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestId {
    pub category: Category,
    pub file: String,
    pub name: String,
}

impl TestId {
    pub fn new(category: Category, file: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category,
            file: file.into(),
            name: name.into(),
        }
    }

    /// Key used for persisted flake history
    pub fn key(&self) -> String {
        format!("{}::{}::{}", self.category, self.file, self.name)
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.category, self.file, self.name)
    }
}

/// Terminal outcome of a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

impl TestOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASS"),
            Self::Failed => write!(f, "FAIL"),
            Self::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Where an assertion failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Failure detail reported by the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
            location: None,
        }
    }

    pub fn with_values(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(SourceLocation {
            file: file.into(),
            line,
            column: None,
        });
        self
    }
}

/// Normalized result of one test case in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    id: TestId,
    outcome: TestOutcome,
    duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<FailureDetail>,
    /// Set only on the synthetic record of a category cancelled by its timeout
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    cancelled: bool,
}

impl TestCaseResult {
    pub fn new(id: TestId, outcome: TestOutcome, duration_ms: u64) -> Self {
        Self {
            id,
            outcome,
            duration_ms,
            tags: Vec::new(),
            failure: None,
            cancelled: false,
        }
    }

    pub fn passed(category: Category, file: &str, name: &str) -> Self {
        Self::new(TestId::new(category, file, name), TestOutcome::Passed, 0)
    }

    pub fn failed(category: Category, file: &str, name: &str, detail: FailureDetail) -> Self {
        Self::new(TestId::new(category, file, name), TestOutcome::Failed, 0).with_failure(detail)
    }

    pub fn skipped(category: Category, file: &str, name: &str) -> Self {
        Self::new(TestId::new(category, file, name), TestOutcome::Skipped, 0)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_failure(mut self, detail: FailureDetail) -> Self {
        self.failure = Some(detail);
        self
    }

    pub(crate) fn cancelled_by_timeout(mut self) -> Self {
        self.cancelled = true;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn id(&self) -> &TestId {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.id.category
    }

    pub fn outcome(&self) -> TestOutcome {
        self.outcome
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn failure(&self) -> Option<&FailureDetail> {
        self.failure.as_ref()
    }

    /// True for the stand-in record of a timed-out category, never for runner output
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Tag match ignoring case and a leading `@` (`@critical` == `critical`)
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim_start_matches('@');
        self.tags
            .iter()
            .any(|t| t.trim_start_matches('@').eq_ignore_ascii_case(wanted))
    }
}

/// All results of one category for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    category: Category,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    results: Vec<TestCaseResult>,
}

impl RunSummary {
    pub fn new(
        category: Category,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        results: Vec<TestCaseResult>,
    ) -> Self {
        Self {
            category,
            started_at,
            duration_ms,
            results,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn results(&self) -> &[TestCaseResult] {
        &self.results
    }
}

// ============================================================================
// Raw runner output
// ============================================================================

/// Status strings accepted from runners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    #[serde(alias = "pass", alias = "ok")]
    Passed,
    #[serde(alias = "fail", alias = "error")]
    Failed,
    #[serde(alias = "skip", alias = "pending", alias = "todo", alias = "disabled")]
    Skipped,
    #[serde(alias = "in_progress")]
    Running,
    Queued,
}

impl RunnerStatus {
    /// `None` for states a finished runner must never report
    pub fn terminal_outcome(self) -> Option<TestOutcome> {
        match self {
            Self::Passed => Some(TestOutcome::Passed),
            Self::Failed => Some(TestOutcome::Failed),
            Self::Skipped => Some(TestOutcome::Skipped),
            Self::Running | Self::Queued => None,
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Running => write!(f, "running"),
            Self::Queued => write!(f, "queued"),
        }
    }
}

/// Failure block as emitted by a runner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFailure {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub actual: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

/// One test record as emitted by a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTestRecord {
    pub file: String,
    #[serde(alias = "title")]
    pub name: String,
    pub status: RunnerStatus,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub failure: Option<RawFailure>,
}

/// Structured output of one runner invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerOutput {
    pub category: Category,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: i64,
    #[serde(default)]
    pub tests: Vec<RawTestRecord>,
}

impl RunnerOutput {
    /// Parse runner JSON, reporting failures against the expected category
    pub fn from_json(category: Category, json: &str) -> Result<Self, crate::CollectionError> {
        serde_json::from_str(json).map_err(|e| crate::CollectionError::Parse {
            category,
            message: e.to_string(),
        })
    }
}
