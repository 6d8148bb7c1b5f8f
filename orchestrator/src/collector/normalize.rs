//! Runner output normalization

use crate::collector::types::{
    Category, FailureDetail, RawTestRecord, RunSummary, RunnerOutput, SourceLocation,
    TestCaseResult, TestId, TestOutcome,
};
use crate::error::CollectionError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Tag carried by the synthetic record of a timed-out category
pub const TIMEOUT_TAG: &str = "timeout";

/// Convert raw runner output into an immutable [`RunSummary`]
pub fn normalize(output: RunnerOutput) -> Result<RunSummary, CollectionError> {
    let category = output.category;

    if output.duration_ms < 0 {
        return Err(CollectionError::NegativeDuration {
            category,
            subject: format!("{category} run"),
            duration_ms: output.duration_ms,
        });
    }

    let results = output
        .tests
        .into_iter()
        .map(|record| normalize_record(category, record))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RunSummary::new(
        category,
        output.started_at.unwrap_or_else(Utc::now),
        output.duration_ms as u64,
        results,
    ))
}

fn normalize_record(
    category: Category,
    record: RawTestRecord,
) -> Result<TestCaseResult, CollectionError> {
    if record.file.trim().is_empty() || record.name.trim().is_empty() {
        return Err(CollectionError::MalformedRecord {
            category,
            message: format!(
                "test record requires file and name (file='{}', name='{}')",
                record.file, record.name
            ),
        });
    }

    let outcome =
        record
            .status
            .terminal_outcome()
            .ok_or_else(|| CollectionError::NonTerminalState {
                category,
                file: record.file.clone(),
                name: record.name.clone(),
                state: record.status.to_string(),
            })?;

    if record.duration_ms < 0 {
        return Err(CollectionError::NegativeDuration {
            category,
            subject: format!("{}::{}", record.file, record.name),
            duration_ms: record.duration_ms,
        });
    }

    // Failure detail is only meaningful on failed tests
    let failure = match (outcome, record.failure) {
        (TestOutcome::Failed, Some(raw)) => {
            let location = raw.line.map(|line| SourceLocation {
                file: raw.file.clone().unwrap_or_else(|| record.file.clone()),
                line,
                column: raw.column,
            });
            Some(FailureDetail {
                message: raw.message,
                expected: raw.expected,
                actual: raw.actual,
                location,
            })
        }
        (TestOutcome::Failed, None) => Some(FailureDetail::new("test failed")),
        _ => None,
    };

    let mut result = TestCaseResult::new(
        TestId::new(category, record.file, record.name),
        outcome,
        record.duration_ms as u64,
    )
    .with_tags(record.tags);
    if let Some(detail) = failure {
        result = result.with_failure(detail);
    }
    Ok(result)
}

/// Synthetic summary for a category cancelled by its timeout
pub fn timeout_summary(
    category: Category,
    started_at: DateTime<Utc>,
    timeout: Duration,
) -> RunSummary {
    let timeout_ms = timeout.as_millis() as u64;
    let record = TestCaseResult::new(
        TestId::new(category, format!("<{category}>"), TIMEOUT_TAG),
        TestOutcome::Failed,
        timeout_ms,
    )
    .with_tags([TIMEOUT_TAG])
    .cancelled_by_timeout()
    .with_failure(FailureDetail::new(format!(
        "{category} run cancelled after {}s timeout",
        timeout.as_secs_f64()
    )));

    RunSummary::new(category, started_at, timeout_ms, vec![record])
}
