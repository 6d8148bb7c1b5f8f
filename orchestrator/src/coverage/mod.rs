//! Coverage Evaluator: per-metric status against target/minimum thresholds
//!
//! Status bands for each metric:
//!
//! ```text
//!   0 ────────── minimum ────────── target ────────── 100
//!   BelowMinimum │    AboveMinimum   │    MeetsTarget
//! ```
//!
//! The minimum is inclusive on the passing side: with a minimum of 80,
//! 79.9 is below minimum and 80.0 is not.

use crate::config::{CoverageThresholds, MetricThreshold};
use crate::error::CollectionError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coverage metric kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Statements,
    Branches,
    Functions,
    Lines,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Statements,
        Metric::Branches,
        Metric::Functions,
        Metric::Lines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statements => "statements",
            Self::Branches => "branches",
            Self::Functions => "functions",
            Self::Lines => "lines",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw coverage percentages for one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub statements: f64,
    pub branches: f64,
    pub functions: f64,
    pub lines: f64,
}

impl CoverageMetrics {
    /// Build and validate (each value finite and within 0..=100)
    pub fn new(
        statements: f64,
        branches: f64,
        functions: f64,
        lines: f64,
    ) -> Result<Self, CollectionError> {
        let metrics = Self {
            statements,
            branches,
            functions,
            lines,
        };
        metrics.validate()?;
        Ok(metrics)
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Statements => self.statements,
            Metric::Branches => self.branches,
            Metric::Functions => self.functions,
            Metric::Lines => self.lines,
        }
    }

    pub fn validate(&self) -> Result<(), CollectionError> {
        for metric in Metric::ALL {
            let value = self.get(metric);
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(CollectionError::InvalidCoverage {
                    metric: metric.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Parse the `coverage-summary.json` shape written by JS coverage tools:
    /// `{"total": {"lines": {"pct": 85.7}, "statements": {"pct": 85.3}, ...}}`
    pub fn from_istanbul_summary(json: &str) -> Result<Self, CollectionError> {
        let root: serde_json::Value =
            serde_json::from_str(json).map_err(|e| CollectionError::InvalidCoverage {
                metric: "summary".to_string(),
                value: e.to_string(),
            })?;
        let total = root.get("total").unwrap_or(&root);

        let pct = |metric: Metric| -> Result<f64, CollectionError> {
            total
                .get(metric.as_str())
                .and_then(|m| m.get("pct"))
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| CollectionError::InvalidCoverage {
                    metric: metric.to_string(),
                    value: "missing".to_string(),
                })
        };

        Self::new(
            pct(Metric::Statements)?,
            pct(Metric::Branches)?,
            pct(Metric::Functions)?,
            pct(Metric::Lines)?,
        )
    }
}

/// Where a metric falls relative to its thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MetricStatus {
    MeetsTarget,
    AboveMinimum,
    BelowMinimum,
}

impl MetricStatus {
    pub fn classify(value: f64, threshold: &MetricThreshold) -> Self {
        if value < threshold.minimum {
            Self::BelowMinimum
        } else if value >= threshold.target {
            Self::MeetsTarget
        } else {
            Self::AboveMinimum
        }
    }
}

impl fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeetsTarget => write!(f, "meets-target"),
            Self::AboveMinimum => write!(f, "above-minimum"),
            Self::BelowMinimum => write!(f, "below-minimum"),
        }
    }
}

/// Evaluation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricEvaluation {
    pub metric: Metric,
    pub value: f64,
    pub target: f64,
    pub minimum: f64,
    pub status: MetricStatus,
    /// Change versus the previous stored run; `None` on the first run
    pub delta: Option<f64>,
}

/// Evaluation of all four metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageEvaluation {
    pub metrics: Vec<MetricEvaluation>,
}

impl CoverageEvaluation {
    pub fn get(&self, metric: Metric) -> Option<&MetricEvaluation> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn below_minimum(&self) -> impl Iterator<Item = &MetricEvaluation> {
        self.metrics
            .iter()
            .filter(|m| m.status == MetricStatus::BelowMinimum)
    }

    /// Metrics in `[minimum, target)`
    pub fn below_target(&self) -> impl Iterator<Item = &MetricEvaluation> {
        self.metrics
            .iter()
            .filter(|m| m.status == MetricStatus::AboveMinimum)
    }

    /// Largest decrease versus the prior run, as a positive number of points
    pub fn largest_drop(&self) -> Option<(Metric, f64)> {
        self.metrics
            .iter()
            .filter_map(|m| m.delta.filter(|d| *d < 0.0).map(|d| (m.metric, -d)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Evaluate raw coverage against thresholds and the prior stored snapshot
pub fn evaluate(
    current: &CoverageMetrics,
    prior: Option<&CoverageMetrics>,
    thresholds: &CoverageThresholds,
) -> CoverageEvaluation {
    let metrics = Metric::ALL
        .iter()
        .map(|&metric| {
            let value = current.get(metric);
            let threshold = thresholds.get(metric);
            MetricEvaluation {
                metric,
                value,
                target: threshold.target,
                minimum: threshold.minimum,
                status: MetricStatus::classify(value, threshold),
                delta: prior.map(|p| round2(value - p.get(metric))),
            }
        })
        .collect();

    CoverageEvaluation { metrics }
}

// Percentages are reported to two decimals; avoids 85.3 - 80.1 = 5.199999...
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(minimum: f64, target: f64) -> CoverageThresholds {
        CoverageThresholds::uniform(MetricThreshold { target, minimum })
    }

    #[test]
    fn test_minimum_boundary_is_inclusive() {
        let t = MetricThreshold {
            target: 90.0,
            minimum: 80.0,
        };
        assert_eq!(MetricStatus::classify(79.9, &t), MetricStatus::BelowMinimum);
        assert_eq!(MetricStatus::classify(80.0, &t), MetricStatus::AboveMinimum);
        assert_eq!(MetricStatus::classify(89.99, &t), MetricStatus::AboveMinimum);
        assert_eq!(MetricStatus::classify(90.0, &t), MetricStatus::MeetsTarget);
    }

    #[test]
    fn test_first_run_has_no_delta() {
        let current = CoverageMetrics::new(85.3, 81.2, 87.1, 85.7).unwrap();
        let eval = evaluate(&current, None, &thresholds(80.0, 80.0));
        assert!(eval.metrics.iter().all(|m| m.delta.is_none()));
        assert!(eval.largest_drop().is_none());
        assert_eq!(eval.below_minimum().count(), 0);
    }

    #[test]
    fn test_delta_against_prior() {
        let prior = CoverageMetrics::new(90.0, 85.0, 90.0, 90.0).unwrap();
        let current = CoverageMetrics::new(78.5, 85.5, 90.0, 88.0).unwrap();
        let eval = evaluate(&current, Some(&prior), &thresholds(80.0, 85.0));

        let statements = eval.get(Metric::Statements).unwrap();
        assert_eq!(statements.delta, Some(-11.5));
        assert_eq!(statements.status, MetricStatus::BelowMinimum);
        assert_eq!(eval.get(Metric::Branches).unwrap().delta, Some(0.5));
        assert_eq!(eval.largest_drop(), Some((Metric::Statements, 11.5)));
    }

    #[test]
    fn test_below_target_band() {
        let current = CoverageMetrics::new(82.0, 95.0, 79.0, 85.0).unwrap();
        let eval = evaluate(&current, None, &thresholds(80.0, 85.0));
        let below_target: Vec<Metric> = eval.below_target().map(|m| m.metric).collect();
        assert_eq!(below_target, vec![Metric::Statements]);
        let below_min: Vec<Metric> = eval.below_minimum().map(|m| m.metric).collect();
        assert_eq!(below_min, vec![Metric::Functions]);
    }

    #[test]
    fn test_invalid_percentages_rejected() {
        assert!(CoverageMetrics::new(101.0, 80.0, 80.0, 80.0).is_err());
        assert!(CoverageMetrics::new(-0.1, 80.0, 80.0, 80.0).is_err());
        assert!(CoverageMetrics::new(f64::NAN, 80.0, 80.0, 80.0).is_err());
        assert!(CoverageMetrics::new(0.0, 100.0, 50.0, 50.0).is_ok());
    }

    #[test]
    fn test_istanbul_summary() {
        let json = r#"{
            "total": {
                "lines": {"total": 100, "covered": 85, "pct": 85.7},
                "statements": {"pct": 85.3},
                "functions": {"pct": 87.1},
                "branches": {"pct": 81.2}
            }
        }"#;
        let metrics = CoverageMetrics::from_istanbul_summary(json).unwrap();
        assert_eq!(metrics.statements, 85.3);
        assert_eq!(metrics.branches, 81.2);
        assert_eq!(metrics.lines, 85.7);

        let missing = r#"{"total": {"lines": {"pct": 50}}}"#;
        assert!(CoverageMetrics::from_istanbul_summary(missing).is_err());
    }
}
