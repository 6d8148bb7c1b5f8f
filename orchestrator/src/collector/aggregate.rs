//! Aggregation of per-category summaries into one invocation-wide run

use crate::collector::types::{Category, RunSummary, TestCaseResult, TestOutcome};
use crate::error::CollectionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Which categories execute concurrently
///
/// Groups run one after another; members of a group run in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionPlan {
    pub groups: Vec<Vec<Category>>,
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::parallel()
    }
}

impl ExecutionPlan {
    /// All categories in one concurrent group
    pub fn parallel() -> Self {
        Self {
            groups: vec![Category::ALL.to_vec()],
        }
    }

    /// Every category in its own group
    pub fn sequential() -> Self {
        Self {
            groups: Category::ALL.iter().map(|c| vec![*c]).collect(),
        }
    }

    /// Wall-clock duration: max within a group, summed across groups
    pub fn wall_clock_ms(&self, durations: &BTreeMap<Category, u64>) -> u64 {
        let mut planned = BTreeSet::new();
        let mut total = 0u64;

        for group in &self.groups {
            let longest = group
                .iter()
                .filter_map(|c| durations.get(c).copied())
                .max()
                .unwrap_or(0);
            planned.extend(group.iter().copied());
            total = total.saturating_add(longest);
        }

        // Unplanned categories are treated as trailing sequential groups
        for (category, duration) in durations {
            if !planned.contains(category) {
                total = total.saturating_add(*duration);
            }
        }

        total
    }
}

/// Counts for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl CategoryTotals {
    /// Tests that actually ran
    pub fn attempted(&self) -> usize {
        self.total - self.skipped
    }

    /// At least one attempt, and every attempt failed
    pub fn all_attempted_failed(&self) -> bool {
        self.attempted() > 0 && self.failed == self.attempted()
    }

    fn record(&mut self, outcome: TestOutcome) {
        self.total += 1;
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Combined results of every category run in one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRun {
    pub run_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Wall-clock duration per the execution plan
    pub duration_ms: u64,
    pub per_category: BTreeMap<Category, CategoryTotals>,
    /// Every result in category order, then runner order
    pub results: Vec<TestCaseResult>,
}

impl AggregateRun {
    /// Failed results, in the same order as `results`
    pub fn failures(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.results.iter().filter(|r| r.outcome().is_failed())
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.per_category.keys().copied()
    }

    pub fn totals(&self, category: Category) -> Option<&CategoryTotals> {
        self.per_category.get(&category)
    }

    /// Compact summary for logging
    pub fn summary(&self) -> String {
        format!(
            "{} tests: {} passed, {} failed, {} skipped ({}ms)",
            self.total, self.passed, self.failed, self.skipped, self.duration_ms
        )
    }
}

/// Join every summary of one invocation
///
/// All started categories must be present; there is no partial aggregation.
pub fn collect(
    summaries: Vec<RunSummary>,
    plan: &ExecutionPlan,
) -> Result<AggregateRun, CollectionError> {
    let mut by_category: BTreeMap<Category, RunSummary> = BTreeMap::new();
    for summary in summaries {
        let category = summary.category();
        if by_category.insert(category, summary).is_some() {
            return Err(CollectionError::DuplicateCategory { category });
        }
    }

    let mut per_category = BTreeMap::new();
    let mut durations = BTreeMap::new();
    let mut results = Vec::new();
    let mut started_at: Option<DateTime<Utc>> = None;

    for (category, summary) in by_category {
        let mut totals = CategoryTotals {
            duration_ms: summary.duration_ms(),
            ..Default::default()
        };
        for result in summary.results() {
            totals.record(result.outcome());
        }

        started_at = Some(match started_at {
            Some(current) => current.min(summary.started_at()),
            None => summary.started_at(),
        });
        durations.insert(category, summary.duration_ms());
        per_category.insert(category, totals);
        results.extend(summary.results().iter().cloned());
    }

    let count = |outcome: TestOutcome| results.iter().filter(|r| r.outcome() == outcome).count();
    let run = AggregateRun {
        run_id: Uuid::new_v4(),
        started_at,
        total: results.len(),
        passed: count(TestOutcome::Passed),
        failed: count(TestOutcome::Failed),
        skipped: count(TestOutcome::Skipped),
        duration_ms: plan.wall_clock_ms(&durations),
        per_category,
        results,
    };

    tracing::debug!(
        run_id = %run.run_id,
        categories = run.per_category.len(),
        "Collected {}",
        run.summary()
    );
    Ok(run)
}
