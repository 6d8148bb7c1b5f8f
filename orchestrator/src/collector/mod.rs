//! Result Collector: normalizes runner output into one aggregate per invocation
//!
//! Each test category (unit, integration, E2E) is run by an external runner
//! that emits a [`RunnerOutput`]. The collector turns every output into an
//! immutable [`RunSummary`], then joins the summaries of one invocation into
//! an [`AggregateRun`].
//!
//! ```text
//! RunnerOutput ──normalize──▶ RunSummary ─┐
//! RunnerOutput ──normalize──▶ RunSummary ─┼──collect──▶ AggregateRun
//! (timed out)  ──synthetic──▶ RunSummary ─┘
//! ```
//!
//! Wall-clock duration follows the [`ExecutionPlan`]: categories in the same
//! parallel group contribute their maximum, groups run back to back.

pub mod aggregate;
pub mod dispatch;
pub mod normalize;
pub mod types;

pub use aggregate::{collect, AggregateRun, CategoryTotals, ExecutionPlan};
pub use dispatch::{run_categories, RunnerSource};
pub use normalize::{normalize, timeout_summary, TIMEOUT_TAG};
pub use types::{
    Category, FailureDetail, RawFailure, RawTestRecord, RunSummary, RunnerOutput, RunnerStatus,
    SourceLocation, TestCaseResult, TestId, TestOutcome,
};
