//! Bounded per-test outcome window

use crate::collector::TestOutcome;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// Rolling outcome history for one test identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlakeRecord {
    /// Oldest first
    pub outcomes: VecDeque<TestOutcome>,
    /// Distinct runs in which this test was classified flaky
    pub flagged_runs: u32,
    pub last_flagged_run: Option<Uuid>,
}

impl FlakeRecord {
    /// Append an outcome, evicting from the front once `window` is reached
    pub fn push(&mut self, outcome: TestOutcome, window: usize) {
        let window = window.max(1);
        while self.outcomes.len() >= window {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
    }

    /// Adjacent pass↔fail alternations within the window
    pub fn flake_count(&self) -> u32 {
        self.outcomes
            .iter()
            .zip(self.outcomes.iter().skip(1))
            .filter(|(a, b)| {
                matches!(
                    (a, b),
                    (TestOutcome::Passed, TestOutcome::Failed)
                        | (TestOutcome::Failed, TestOutcome::Passed)
                )
            })
            .count() as u32
    }

    pub fn has_pass(&self) -> bool {
        self.outcomes.iter().any(TestOutcome::is_passed)
    }

    pub fn has_fail(&self) -> bool {
        self.outcomes.iter().any(TestOutcome::is_failed)
    }

    pub fn last(&self) -> Option<TestOutcome> {
        self.outcomes.back().copied()
    }

    /// Count a flagged run once, however often it is reported
    pub(crate) fn flag(&mut self, run_id: Uuid) -> bool {
        if self.last_flagged_run == Some(run_id) {
            return false;
        }
        self.last_flagged_run = Some(run_id);
        self.flagged_runs = self.flagged_runs.saturating_add(1);
        true
    }

    /// Shrink to a new window size, dropping the oldest outcomes
    pub(crate) fn truncate_to(&mut self, window: usize) {
        while self.outcomes.len() > window.max(1) {
            self.outcomes.pop_front();
        }
    }

    /// Compact `PFPF` rendering of the window
    pub fn pattern(&self) -> String {
        self.outcomes
            .iter()
            .map(|o| match o {
                TestOutcome::Passed => 'P',
                TestOutcome::Failed => 'F',
                TestOutcome::Skipped => 'S',
            })
            .collect()
    }
}

/// Persisted snapshot of every tracked test, keyed by `TestId::key()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlakeHistory {
    pub records: BTreeMap<String, FlakeRecord>,
}

impl FlakeHistory {
    pub fn get(&self, key: &str) -> Option<&FlakeRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlakeRecord)> {
        self.records.iter()
    }
}
