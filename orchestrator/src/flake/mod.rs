//! Flake tracker
//!
//! Distinguishes a flaky test from a deterministic failure using a bounded,
//! persisted window of recent outcomes per test identity. The tracker owns one
//! snapshot of [`FlakeHistory`]: a snapshot goes in, an updated snapshot comes
//! out, and nothing is held in process-wide state.

pub mod record;

pub use record::{FlakeHistory, FlakeRecord};

use crate::collector::{AggregateRun, TestId, TestOutcome};
use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Window and threshold for flaky classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakeSettings {
    pub window: usize,
    pub threshold: u32,
}

impl Default for FlakeSettings {
    fn default() -> Self {
        Self {
            window: 10,
            threshold: 3,
        }
    }
}

impl From<&EngineConfig> for FlakeSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            window: config.flake_window,
            threshold: config.flake_threshold,
        }
    }
}

/// Flaky tests observed in one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlakeClassification {
    /// Keys of tests in this run classified flaky
    pub flaky: BTreeSet<String>,
    /// Distinct flagged runs per flaky key, including this one
    pub flagged_runs: BTreeMap<String, u32>,
}

impl FlakeClassification {
    pub fn is_flaky(&self, id: &TestId) -> bool {
        self.flaky.contains(&id.key())
    }

    pub fn count(&self) -> usize {
        self.flaky.len()
    }

    /// Flaky keys flagged in at least `runs` distinct runs
    pub fn recurrent(&self, runs: u32) -> Vec<String> {
        self.flagged_runs
            .iter()
            .filter(|(_, n)| **n >= runs)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Single writer over one flake-history snapshot
#[derive(Debug, Clone, Default)]
pub struct FlakeTracker {
    history: FlakeHistory,
    settings: FlakeSettings,
}

impl FlakeTracker {
    pub fn new(mut history: FlakeHistory, settings: FlakeSettings) -> Self {
        // A shrunk window applies to stored records too
        for record in history.records.values_mut() {
            record.truncate_to(settings.window);
        }
        Self { history, settings }
    }

    pub fn settings(&self) -> FlakeSettings {
        self.settings
    }

    pub fn history(&self) -> &FlakeHistory {
        &self.history
    }

    /// Append one outcome and return the test's current flake count
    ///
    /// Skipped outcomes carry no pass/fail signal and leave the window as is.
    pub fn record_outcome(&mut self, id: &TestId, outcome: TestOutcome) -> u32 {
        if outcome == TestOutcome::Skipped {
            return self.flake_count(id);
        }
        let record = self.history.records.entry(id.key()).or_default();
        record.push(outcome, self.settings.window);
        record.flake_count()
    }

    pub fn flake_count(&self, id: &TestId) -> u32 {
        self.history
            .get(&id.key())
            .map(FlakeRecord::flake_count)
            .unwrap_or(0)
    }

    /// Enough alternations, and at least one pass and one fail in the window
    ///
    /// A test that only ever fails is a deterministic failure, never flaky.
    pub fn is_flaky(&self, id: &TestId) -> bool {
        self.history.get(&id.key()).is_some_and(|record| {
            record.flake_count() >= self.settings.threshold
                && record.has_pass()
                && record.has_fail()
        })
    }

    /// Record every result of a run, then classify the tests that ran
    pub fn record_run(&mut self, run: &AggregateRun) -> FlakeClassification {
        for result in &run.results {
            self.record_outcome(result.id(), result.outcome());
        }

        let mut classification = FlakeClassification::default();
        for result in &run.results {
            if result.outcome() == TestOutcome::Skipped || !self.is_flaky(result.id()) {
                continue;
            }
            let key = result.id().key();
            if let Some(record) = self.history.records.get_mut(&key) {
                record.flag(run.run_id);
                classification
                    .flagged_runs
                    .insert(key.clone(), record.flagged_runs);
            }
            classification.flaky.insert(key);
        }

        tracing::debug!(
            run_id = %run.run_id,
            tracked = self.history.len(),
            flaky = classification.count(),
            "Flake classification complete"
        );
        classification
    }

    pub fn into_history(self) -> FlakeHistory {
        self.history
    }
}
