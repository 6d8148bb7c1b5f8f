//! Critical-test predicate
//!
//! A critical test covers a high-risk path (authentication, payment). The
//! caller decides what counts as critical; [`PatternPredicate`] is the
//! configuration-driven default.

use crate::collector::TestCaseResult;
use crate::error::ConfigurationError;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

/// Caller-supplied critical-test predicate
pub trait CriticalTagPredicate: Send + Sync {
    fn is_critical(&self, result: &TestCaseResult) -> bool;
}

impl<F> CriticalTagPredicate for F
where
    F: Fn(&TestCaseResult) -> bool + Send + Sync,
{
    fn is_critical(&self, result: &TestCaseResult) -> bool {
        self(result)
    }
}

/// Configuration for [`PatternPredicate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalRules {
    /// Runner tags that mark a test critical (`critical` matches `@critical`)
    pub tags: Vec<String>,
    /// Regexes matched against the test file path
    pub path_patterns: Vec<String>,
    /// Regexes matched against the test name
    pub name_patterns: Vec<String>,
}

impl Default for CriticalRules {
    fn default() -> Self {
        Self {
            tags: vec!["critical".to_string()],
            path_patterns: Vec::new(),
            name_patterns: Vec::new(),
        }
    }
}

/// Tag/path/name matcher built from [`CriticalRules`]
#[derive(Debug, Clone)]
pub struct PatternPredicate {
    tags: Vec<String>,
    paths: RegexSet,
    names: RegexSet,
}

impl PatternPredicate {
    pub fn compile(rules: &CriticalRules) -> Result<Self, ConfigurationError> {
        Ok(Self {
            tags: rules.tags.clone(),
            paths: compile_set(&rules.path_patterns)?,
            names: compile_set(&rules.name_patterns)?,
        })
    }
}

fn compile_set(patterns: &[String]) -> Result<RegexSet, ConfigurationError> {
    // Compile one by one so the error names the offending pattern
    for pattern in patterns {
        Regex::new(pattern).map_err(|e| ConfigurationError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
    }
    RegexSet::new(patterns).map_err(|e| ConfigurationError::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

impl CriticalTagPredicate for PatternPredicate {
    fn is_critical(&self, result: &TestCaseResult) -> bool {
        self.tags.iter().any(|tag| result.has_tag(tag))
            || self.paths.is_match(&result.id().file)
            || self.names.is_match(&result.id().name)
    }
}
