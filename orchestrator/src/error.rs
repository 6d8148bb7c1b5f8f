//! Engine error types
//!
//! Only malformed input and invalid configuration are errors. Failing tests,
//! low coverage and flakiness are data for the classifier and never surface
//! here.

use crate::collector::Category;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Malformed or missing runner output. Fatal: no partial verdict is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectionError {
    /// Runner reported a test that never reached a terminal state
    #[error("{category} runner reported non-terminal state '{state}' for {file}::{name}")]
    NonTerminalState {
        category: Category,
        file: String,
        name: String,
        state: String,
    },

    /// A test or run duration was negative
    #[error("{category} runner reported negative duration {duration_ms}ms for {subject}")]
    NegativeDuration {
        category: Category,
        subject: String,
        duration_ms: i64,
    },

    /// Record is missing identity fields
    #[error("{category} runner produced a malformed record: {message}")]
    MalformedRecord { category: Category, message: String },

    /// The same category was reported twice in one invocation
    #[error("category {category} reported more than once in a single invocation")]
    DuplicateCategory { category: Category },

    /// Runner output could not be parsed
    #[error("failed to parse {category} runner output: {message}")]
    Parse { category: Category, message: String },

    /// Runner could not be launched or crashed
    #[error("{category} runner failed: {message}")]
    Runner { category: Category, message: String },

    /// Coverage percentage outside 0..=100 or not a number
    #[error("invalid coverage value for {metric}: {value}")]
    InvalidCoverage { metric: String, value: String },
}

/// Invalid configuration. Raised at load time, never reaches the classifier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Minimum threshold above target threshold
    #[error("{metric}: minimum {minimum} exceeds target {target}")]
    MinimumAboveTarget {
        metric: String,
        minimum: f64,
        target: f64,
    },

    /// Threshold outside the 0..=100 percentage range
    #[error("{metric}: threshold {value} is outside 0..=100")]
    ThresholdOutOfRange { metric: String, value: f64 },

    /// Numeric option with an unusable value
    #[error("invalid value for {option}: {message}")]
    InvalidValue { option: String, message: String },

    /// Critical-test pattern failed to compile
    #[error("invalid critical pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Config file could not be read
    #[error("failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Config file could not be parsed
    #[error("failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ConfigurationError {
    pub(crate) fn invalid(option: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            option: option.to_string(),
            message: message.into(),
        }
    }
}

/// Persisted-state failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error for {key}: {message}")]
    Deserialization { key: String, message: String },

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Store did not apply the update for {0}")]
    UpdateSkipped(String),
}

/// A notification sink could not deliver an escalation
///
/// Never fatal to the evaluation; the verdict and report stand on their own.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{sink} notification failed: {message}")]
pub struct NotifyError {
    pub sink: String,
    pub message: String,
}

impl NotifyError {
    pub fn new(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            message: message.into(),
        }
    }
}

/// Top-level engine error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Machine-readable error code for front ends
    pub fn code(&self) -> &'static str {
        match self {
            Self::Collection(_) => "COLLECTION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_error_display() {
        let err = CollectionError::NonTerminalState {
            category: Category::Unit,
            file: "src/a.test.ts".to_string(),
            name: "adds".to_string(),
            state: "running".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("unit"), "msg: {msg}");
        assert!(msg.contains("running"), "msg: {msg}");
        assert!(msg.contains("src/a.test.ts::adds"), "msg: {msg}");
    }

    #[test]
    fn test_engine_error_codes() {
        let collection: EngineError = CollectionError::DuplicateCategory {
            category: Category::E2e,
        }
        .into();
        assert_eq!(collection.code(), "COLLECTION_ERROR");

        let config: EngineError = ConfigurationError::invalid("flake_window", "too small").into();
        assert_eq!(config.code(), "CONFIGURATION_ERROR");
        assert!(config.to_string().contains("flake_window"));

        let store: EngineError = StoreError::LockPoisoned.into();
        assert_eq!(store.code(), "STORE_ERROR");
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MinimumAboveTarget {
            metric: "branches".to_string(),
            minimum: 90.0,
            target: 80.0,
        };
        assert_eq!(err.to_string(), "branches: minimum 90 exceeds target 80");
    }
}
