//! Test Orchestration & Escalation Engine
//!
//! This library provides:
//! - Normalization and aggregation of unit, integration and E2E runner output
//! - Coverage evaluation against per-metric targets and minimums
//! - Flaky-test tracking over a persisted, bounded outcome window
//! - A tiered verdict classifier (SUCCESS / WARNING / FAILURE)
//! - An escalation policy deciding whether a human must be notified
//! - A deterministic report value for terminals, PR comments and tickets
//!
//! # Data flow
//!
//! ```text
//! runner output → collector → {coverage, flake} → verdict → escalation → report
//! ```
//!
//! Every stage after dispatch is a synchronous transformation. The only state
//! that outlives an invocation is [`ProjectState`], read and written through a
//! [`HistoryStore`] in one atomic update.
//!
//! # Usage
//!
//! ```no_run
//! use test_orchestrator::{EngineConfig, EvaluationInput, MemoryStore, StateKey, TestOrchestrator};
//!
//! # fn main() -> Result<(), test_orchestrator::EngineError> {
//! let engine = TestOrchestrator::from_config(EngineConfig::default())?;
//! let store = MemoryStore::new();
//! let evaluation = engine.evaluate_with_store(
//!     &store,
//!     EvaluationInput {
//!         key: StateKey::new("shop", "main"),
//!         summaries: vec![],
//!         coverage: None,
//!     },
//! )?;
//! println!("{}", evaluation.report.summary());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod collector;
pub mod config;
pub mod coverage;
pub mod error;
pub mod escalation;
pub mod flake;
pub mod pipeline;
pub mod report;
pub mod state;
pub mod verdict;

// Re-export error types
pub use error::{
    CollectionError, ConfigurationError, EngineError, EngineResult, NotifyError, StoreError,
};

// Re-export collector types
pub use collector::{
    collect, normalize, run_categories, timeout_summary, AggregateRun, Category, CategoryTotals,
    ExecutionPlan, FailureDetail, RunSummary, RunnerOutput, RunnerSource, TestCaseResult, TestId,
    TestOutcome,
};

// Re-export configuration types
pub use config::{
    CoverageThresholds, CriticalRules, CriticalTagPredicate, EngineConfig, MetricThreshold,
    PatternPredicate,
};

// Re-export coverage types
pub use coverage::{CoverageEvaluation, CoverageMetrics, Metric, MetricEvaluation, MetricStatus};

// Re-export flake types
pub use flake::{FlakeClassification, FlakeHistory, FlakeRecord, FlakeSettings, FlakeTracker};

// Re-export verdict types
pub use verdict::{Reason, ReasonTag, Verdict, VerdictClassifier, VerdictLevel, VerdictPolicy};

// Re-export escalation types
pub use escalation::{
    deliver, EscalationDecision, EscalationPolicy, EscalationTrigger, NotificationSink, Severity,
};

// Re-export report types
pub use report::{Report, ReportRenderer};

// Re-export state types
pub use state::{HistoryStore, JsonFileStore, MemoryStore, ProjectState, StateKey};

// Re-export the engine facade
pub use pipeline::{Evaluation, EvaluationInput, TestOrchestrator};
