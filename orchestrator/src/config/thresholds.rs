//! Coverage thresholds

use crate::coverage::Metric;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Target and minimum for one metric (`target >= minimum`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub target: f64,
    pub minimum: f64,
}

impl Default for MetricThreshold {
    fn default() -> Self {
        Self {
            target: 80.0,
            minimum: 80.0,
        }
    }
}

impl MetricThreshold {
    fn validate(&self, metric: Metric) -> Result<(), ConfigurationError> {
        for value in [self.target, self.minimum] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigurationError::ThresholdOutOfRange {
                    metric: metric.to_string(),
                    value,
                });
            }
        }
        if self.minimum > self.target {
            return Err(ConfigurationError::MinimumAboveTarget {
                metric: metric.to_string(),
                minimum: self.minimum,
                target: self.target,
            });
        }
        Ok(())
    }
}

/// Thresholds for all four metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageThresholds {
    pub statements: MetricThreshold,
    pub branches: MetricThreshold,
    pub functions: MetricThreshold,
    pub lines: MetricThreshold,
}

impl CoverageThresholds {
    /// Same threshold for every metric
    pub fn uniform(threshold: MetricThreshold) -> Self {
        Self {
            statements: threshold,
            branches: threshold,
            functions: threshold,
            lines: threshold,
        }
    }

    pub fn get(&self, metric: Metric) -> &MetricThreshold {
        match metric {
            Metric::Statements => &self.statements,
            Metric::Branches => &self.branches,
            Metric::Functions => &self.functions,
            Metric::Lines => &self.lines,
        }
    }

    pub fn get_mut(&mut self, metric: Metric) -> &mut MetricThreshold {
        match metric {
            Metric::Statements => &mut self.statements,
            Metric::Branches => &mut self.branches,
            Metric::Functions => &mut self.functions,
            Metric::Lines => &mut self.lines,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for metric in Metric::ALL {
            self.get(metric).validate(metric)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_valid() {
        let thresholds = CoverageThresholds::default();
        assert!(thresholds.validate().is_ok());
        assert_eq!(thresholds.lines.minimum, 80.0);
    }

    #[test]
    fn test_minimum_above_target_rejected() {
        let mut thresholds = CoverageThresholds::default();
        thresholds.get_mut(Metric::Branches).minimum = 85.0;
        let err = thresholds.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MinimumAboveTarget { ref metric, .. } if metric == "branches"
        ));
    }

    #[test]
    fn test_equal_minimum_and_target_allowed() {
        let thresholds = CoverageThresholds::uniform(MetricThreshold {
            target: 75.0,
            minimum: 75.0,
        });
        assert!(thresholds.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        let thresholds = CoverageThresholds::uniform(MetricThreshold {
            target: 120.0,
            minimum: 80.0,
        });
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigurationError::ThresholdOutOfRange { .. })
        ));
    }
}
