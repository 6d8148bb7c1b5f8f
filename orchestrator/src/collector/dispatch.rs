//! Concurrent category dispatch
//!
//! Runs each requested category through a [`RunnerSource`], joins all of them,
//! and converts a per-category timeout into a synthetic failing summary so the
//! rest of the pipeline still runs on partial data.

use crate::collector::normalize::{normalize, timeout_summary};
use crate::collector::types::{Category, RunSummary, RunnerOutput};
use crate::error::CollectionError;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use std::time::Duration;

/// Produces raw output for one test category
///
/// Implementations wrap the external runners (a command line, a results file,
/// a CI artifact). Retrying individual tests is their concern, not the engine's.
#[async_trait]
pub trait RunnerSource: Send + Sync {
    async fn run(&self, category: Category) -> Result<RunnerOutput, CollectionError>;
}

/// Run every category concurrently and wait for all of them
///
/// A category that exceeds `timeout_for(category)` is cancelled and reported
/// through [`timeout_summary`]. Any [`CollectionError`] aborts the whole
/// invocation, but only after every category has finished.
pub async fn run_categories<S, F>(
    source: &S,
    categories: &[Category],
    timeout_for: F,
) -> Result<Vec<RunSummary>, CollectionError>
where
    S: RunnerSource + ?Sized,
    F: Fn(Category) -> Duration,
{
    let mut unique: Vec<Category> = Vec::with_capacity(categories.len());
    for category in categories {
        if !unique.contains(category) {
            unique.push(*category);
        }
    }

    let timeout_for = &timeout_for;
    let tasks = unique.into_iter().map(|category| async move {
        let started_at = Utc::now();
        let limit = timeout_for(category);
        tracing::debug!(%category, timeout_ms = limit.as_millis() as u64, "Dispatching runner");

        match tokio::time::timeout(limit, source.run(category)).await {
            Ok(Ok(mut output)) => {
                if output.category != category {
                    return Err(CollectionError::MalformedRecord {
                        category,
                        message: format!("runner returned output for {}", output.category),
                    });
                }
                output.started_at.get_or_insert(started_at);
                normalize(output)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    %category,
                    timeout_ms = limit.as_millis() as u64,
                    "Category timed out; recording synthetic failure"
                );
                Ok(timeout_summary(category, started_at, limit))
            }
        }
    });

    join_all(tasks).await.into_iter().collect()
}
