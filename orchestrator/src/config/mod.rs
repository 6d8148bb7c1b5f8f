//! Engine configuration
//!
//! Resolution order: defaults → config file (TOML or YAML) → `TESTGATE_*`
//! environment variables → front-end flags. Every path ends in
//! [`EngineConfig::validate`]; an invalid configuration never reaches the
//! classifier.

pub mod critical;
pub mod thresholds;

pub use critical::{CriticalRules, CriticalTagPredicate, PatternPredicate};
pub use thresholds::{CoverageThresholds, MetricThreshold};

use crate::collector::{Category, ExecutionPlan};
use crate::coverage::Metric;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Per-category timeout overrides (milliseconds)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTimeouts {
    pub unit: Option<u64>,
    pub integration: Option<u64>,
    pub e2e: Option<u64>,
}

impl CategoryTimeouts {
    pub fn get(&self, category: Category) -> Option<u64> {
        match category {
            Category::Unit => self.unit,
            Category::Integration => self.integration,
            Category::E2e => self.e2e,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Coverage target/minimum per metric
    pub thresholds: CoverageThresholds,
    /// Outcomes kept per test in the flake window
    pub flake_window: usize,
    /// Alternations within the window that mark a test flaky
    pub flake_threshold: u32,
    /// Flaky tests tolerated in one run before the run fails
    pub flake_escalation_limit: u32,
    /// Distinct flagged runs after which a flaky test is escalated
    pub flaky_run_escalation: u32,
    /// Coverage drop (percentage points) that escalates
    pub coverage_drop_escalation: f64,
    /// Run duration at or above which the run fails
    pub timeout_ms: u64,
    /// Run duration above which the run warns
    pub warning_duration_ms: u64,
    /// Per-category cancellation timeouts; unset categories use `timeout_ms`
    pub category_timeout_ms: CategoryTimeouts,
    /// Critical-test matching rules
    pub critical: CriticalRules,
    /// Report flaky critical failures as critical failures
    pub flaky_critical_escalates: bool,
    /// Which categories run concurrently
    pub execution_plan: ExecutionPlan,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: CoverageThresholds::default(),
            flake_window: 10,
            flake_threshold: 3,
            flake_escalation_limit: 3,
            flaky_run_escalation: 3,
            coverage_drop_escalation: 10.0,
            timeout_ms: 30 * 60 * 1000,
            warning_duration_ms: 10 * 60 * 1000,
            category_timeout_ms: CategoryTimeouts::default(),
            critical: CriticalRules::default(),
            flaky_critical_escalates: true,
            execution_plan: ExecutionPlan::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a `.toml`, `.yaml` or `.yml` file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::parse(path, &raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded engine config");
        Ok(config)
    }

    /// Parse file contents, choosing the format from the extension
    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigurationError> {
        let parse_err = |message: String| ConfigurationError::Parse {
            path: path.to_path_buf(),
            message,
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string()))
            }
            _ => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Apply `TESTGATE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigurationError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (testable without touching
    /// the process environment)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "TESTGATE_TIMEOUT_MS")? {
            self.timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "TESTGATE_WARNING_DURATION_MS")? {
            self.warning_duration_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "TESTGATE_FLAKE_WINDOW")? {
            self.flake_window = v;
        }
        if let Some(v) = parse_var(&lookup, "TESTGATE_FLAKE_THRESHOLD")? {
            self.flake_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "TESTGATE_FLAKE_ESCALATION_LIMIT")? {
            self.flake_escalation_limit = v;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "TESTGATE_COVERAGE_MINIMUM")? {
            for metric in Metric::ALL {
                self.thresholds.get_mut(metric).minimum = v;
            }
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "TESTGATE_COVERAGE_TARGET")? {
            for metric in Metric::ALL {
                self.thresholds.get_mut(metric).target = v;
            }
        }
        if let Some(val) = lookup("TESTGATE_FLAKY_CRITICAL_ESCALATES") {
            self.flaky_critical_escalates = val.to_lowercase() == "true" || val == "1";
        }
        Ok(())
    }

    /// Set the same minimum for every metric, raising targets that fall below it
    pub fn set_uniform_minimum(&mut self, minimum: f64) {
        for metric in Metric::ALL {
            let threshold = self.thresholds.get_mut(metric);
            threshold.minimum = minimum;
            if threshold.target < minimum {
                threshold.target = minimum;
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cancellation timeout for one category
    pub fn category_timeout(&self, category: Category) -> Duration {
        Duration::from_millis(
            self.category_timeout_ms
                .get(category)
                .unwrap_or(self.timeout_ms),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.thresholds.validate()?;

        if self.flake_window < 2 {
            return Err(ConfigurationError::invalid(
                "flake_window",
                format!("{} (needs at least 2 outcomes)", self.flake_window),
            ));
        }
        if self.flake_threshold == 0 {
            return Err(ConfigurationError::invalid("flake_threshold", "must be >= 1"));
        }
        if self.flaky_run_escalation == 0 {
            return Err(ConfigurationError::invalid(
                "flaky_run_escalation",
                "must be >= 1",
            ));
        }
        if !self.coverage_drop_escalation.is_finite() || self.coverage_drop_escalation <= 0.0 {
            return Err(ConfigurationError::invalid(
                "coverage_drop_escalation",
                format!("{} (must be a positive number)", self.coverage_drop_escalation),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigurationError::invalid("timeout_ms", "must be > 0"));
        }
        if self.warning_duration_ms == 0 {
            return Err(ConfigurationError::invalid(
                "warning_duration_ms",
                "must be > 0",
            ));
        }
        for category in Category::ALL {
            if self.category_timeout_ms.get(category) == Some(0) {
                return Err(ConfigurationError::invalid(
                    "category_timeout_ms",
                    format!("{category} timeout must be > 0"),
                ));
            }
        }

        let mut planned = BTreeSet::new();
        for group in &self.execution_plan.groups {
            if group.is_empty() {
                return Err(ConfigurationError::invalid(
                    "execution_plan",
                    "empty parallel group",
                ));
            }
            for category in group {
                if !planned.insert(*category) {
                    return Err(ConfigurationError::invalid(
                        "execution_plan",
                        format!("{category} appears in more than one group"),
                    ));
                }
            }
        }

        PatternPredicate::compile(&self.critical)?;

        if self.warning_duration_ms >= self.timeout_ms {
            tracing::warn!(
                warning_duration_ms = self.warning_duration_ms,
                timeout_ms = self.timeout_ms,
                "Warning duration is not below the timeout; duration warnings will never fire"
            );
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigurationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigurationError::invalid(key, format!("'{raw}': {e}"))),
    }
}
