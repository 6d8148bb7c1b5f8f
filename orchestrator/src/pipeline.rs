//! Engine facade
//!
//! Runs the data flow end to end: collect → coverage → flake → verdict →
//! escalation → report. State goes in as a snapshot and comes back out as an
//! updated snapshot; persistence is the store's job.

use crate::collector::{collect, run_categories, AggregateRun, Category, RunSummary, RunnerSource};
use crate::config::{CriticalTagPredicate, EngineConfig, PatternPredicate};
use crate::coverage::{self, CoverageEvaluation, CoverageMetrics};
use crate::error::{ConfigurationError, EngineResult, StoreError};
use crate::escalation::{EscalationContext, EscalationDecision, EscalationPolicy};
use crate::flake::{FlakeClassification, FlakeSettings, FlakeTracker};
use crate::report::{Report, ReportContext, ReportRenderer};
use crate::state::{HistoryStore, ProjectState, StateKey};
use crate::verdict::{ClassifierInput, Verdict, VerdictClassifier, VerdictPolicy};
use chrono::Utc;
use std::sync::Arc;

/// One invocation's inputs
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub key: StateKey,
    /// One summary per attempted category
    pub summaries: Vec<RunSummary>,
    /// `None` when no coverage tool ran; coverage rules are then skipped
    pub coverage: Option<CoverageMetrics>,
}

/// Everything one evaluation produced
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub run: AggregateRun,
    pub coverage: CoverageEvaluation,
    pub flaky: FlakeClassification,
    pub verdict: Verdict,
    pub decision: EscalationDecision,
    pub report: Report,
    /// State to persist for the next invocation
    pub state: ProjectState,
}

/// Test orchestration engine
pub struct TestOrchestrator {
    config: EngineConfig,
    critical: Arc<dyn CriticalTagPredicate>,
    classifier: VerdictClassifier,
    escalation: EscalationPolicy,
    renderer: ReportRenderer,
}

impl TestOrchestrator {
    /// Build with a caller-supplied critical-test predicate
    pub fn new<P>(config: EngineConfig, critical: P) -> Result<Self, ConfigurationError>
    where
        P: CriticalTagPredicate + 'static,
    {
        config.validate()?;
        Ok(Self {
            classifier: VerdictClassifier::new(VerdictPolicy::from(&config)),
            escalation: EscalationPolicy::from(&config),
            renderer: ReportRenderer,
            critical: Arc::new(critical),
            config,
        })
    }

    /// Build with the predicate compiled from `config.critical`
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigurationError> {
        let predicate = PatternPredicate::compile(&config.critical)?;
        Self::new(config, predicate)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pure evaluation over a state snapshot
    pub fn evaluate(&self, input: EvaluationInput, state: ProjectState) -> EngineResult<Evaluation> {
        if let Some(metrics) = &input.coverage {
            metrics.validate()?;
        }

        let run = collect(input.summaries, &self.config.execution_plan)?;

        let coverage = match &input.coverage {
            Some(metrics) => coverage::evaluate(
                metrics,
                state.last_coverage.as_ref(),
                &self.config.thresholds,
            ),
            None => CoverageEvaluation::default(),
        };

        let mut tracker =
            FlakeTracker::new(state.flake_history, FlakeSettings::from(&self.config));
        let flaky = tracker.record_run(&run);

        let verdict = self.classifier.classify(&ClassifierInput {
            run: &run,
            coverage: &coverage,
            flaky: &flaky,
            critical: self.critical.as_ref(),
            duration_ms: run.duration_ms,
        });

        let decision = self.escalation.decide(
            &verdict,
            &EscalationContext {
                run: &run,
                coverage: &coverage,
                flaky: &flaky,
            },
        );

        let report = self.renderer.render(&ReportContext {
            project: &input.key.project,
            branch: &input.key.branch,
            run: &run,
            coverage: &coverage,
            verdict: &verdict,
            decision: &decision,
            critical: self.critical.as_ref(),
            flaky: &flaky,
        });

        let state = ProjectState {
            flake_history: tracker.into_history(),
            last_coverage: input.coverage.or(state.last_coverage),
            runs_recorded: state.runs_recorded.saturating_add(1),
            updated_at: Some(Utc::now()),
            last_run_id: Some(run.run_id),
            last_verdict: Some(verdict.level()),
        };

        tracing::info!(
            key = %input.key,
            run_id = %run.run_id,
            verdict = %verdict.level(),
            reasons = verdict.reasons().len(),
            notify = decision.notify,
            "{}",
            report.summary()
        );

        Ok(Evaluation {
            run,
            coverage,
            flaky,
            verdict,
            decision,
            report,
            state,
        })
    }

    /// Evaluate inside one atomic store update
    ///
    /// Nothing is persisted when the evaluation fails.
    pub fn evaluate_with_store<H>(&self, store: &H, input: EvaluationInput) -> EngineResult<Evaluation>
    where
        H: HistoryStore + ?Sized,
    {
        let key = input.key.clone();
        let mut outcome: Option<Evaluation> = None;
        store.update(&key, &mut |state: &mut ProjectState| {
            let evaluation = self.evaluate(input.clone(), state.clone())?;
            *state = evaluation.state.clone();
            outcome = Some(evaluation);
            Ok(())
        })?;
        outcome.ok_or_else(|| StoreError::UpdateSkipped(key.to_string()).into())
    }

    /// Run the categories concurrently, then evaluate against the store
    pub async fn execute<S, H>(
        &self,
        source: &S,
        store: &H,
        key: &StateKey,
        categories: &[Category],
        coverage: Option<CoverageMetrics>,
    ) -> EngineResult<Evaluation>
    where
        S: RunnerSource + ?Sized,
        H: HistoryStore + ?Sized,
    {
        let summaries =
            run_categories(source, categories, |c| self.config.category_timeout(c)).await?;
        self.evaluate_with_store(
            store,
            EvaluationInput {
                key: key.clone(),
                summaries,
                coverage,
            },
        )
    }
}
