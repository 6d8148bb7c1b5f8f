//! Escalation policy: whether a human must look at this run
//!
//! Decisions are plain data. Delivering them is the job of a
//! [`NotificationSink`] the caller supplies.

pub mod policy;

pub use policy::{EscalationContext, EscalationPolicy};

use crate::error::NotifyError;
use crate::report::Report;
use crate::verdict::ReasonTag;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification severity
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Normal,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One condition that caused an escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EscalationTrigger {
    pub tag: ReasonTag,
    pub detail: String,
}

impl EscalationTrigger {
    pub fn new(tag: ReasonTag, detail: impl Into<String>) -> Self {
        Self {
            tag,
            detail: detail.into(),
        }
    }
}

/// Notify-or-not, with severity and a rendered message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EscalationDecision {
    pub notify: bool,
    pub severity: Severity,
    pub triggers: Vec<EscalationTrigger>,
    pub message: String,
}

impl EscalationDecision {
    pub fn none() -> Self {
        Self {
            notify: false,
            severity: Severity::None,
            triggers: Vec::new(),
            message: "No escalation".to_string(),
        }
    }

    pub fn is_high(&self) -> bool {
        self.severity == Severity::High
    }

    pub fn has_trigger(&self, tag: ReasonTag) -> bool {
        self.triggers.iter().any(|t| t.tag == tag)
    }
}

/// Delivery channel for escalations (chat, ticket system, PR comment)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn notify(
        &self,
        decision: &EscalationDecision,
        report: &Report,
    ) -> Result<(), NotifyError>;
}

/// Hand a decision to `sink` when it asks for notification
///
/// Returns whether the sink was called.
pub async fn deliver<S>(
    sink: &S,
    decision: &EscalationDecision,
    report: &Report,
) -> Result<bool, NotifyError>
where
    S: NotificationSink + ?Sized,
{
    if !decision.notify {
        tracing::debug!(sink = sink.name(), "Nothing to deliver");
        return Ok(false);
    }

    match sink.notify(decision, report).await {
        Ok(()) => {
            tracing::info!(
                sink = sink.name(),
                severity = %decision.severity,
                triggers = decision.triggers.len(),
                "Escalation delivered"
            );
            Ok(true)
        }
        Err(e) => {
            tracing::warn!(sink = sink.name(), error = %e, "Escalation delivery failed");
            Err(e)
        }
    }
}
