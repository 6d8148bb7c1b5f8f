//! Notification sinks for escalation decisions.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use test_orchestrator::{EscalationDecision, NotificationSink, NotifyError, Report, Severity};
use tracing::{info, warn};

/// Writes escalations to the log; always available.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(
        &self,
        decision: &EscalationDecision,
        report: &Report,
    ) -> Result<(), NotifyError> {
        match decision.severity {
            Severity::High => warn!(
                project = %report.project,
                branch = %report.branch,
                run_id = %report.run_id,
                "ESCALATION (high): {}",
                decision.message
            ),
            _ => info!(
                project = %report.project,
                branch = %report.branch,
                run_id = %report.run_id,
                "Escalation ({}): {}",
                decision.severity,
                decision.message
            ),
        }
        Ok(())
    }
}

/// POSTs the decision and report as JSON (chat hook, ticket bridge).
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn payload(decision: &EscalationDecision, report: &Report) -> serde_json::Value {
        json!({
            "type": "test_escalation",
            "severity": decision.severity,
            "message": decision.message,
            "triggers": decision.triggers,
            "summary": report.summary(),
            "markdown": report.to_markdown(),
            "report": report,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(
        &self,
        decision: &EscalationDecision,
        report: &Report,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(decision, report))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| NotifyError::new("webhook", e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::new(
                "webhook",
                format!("{} returned {}", self.url, response.status()),
            ));
        }
        info!(status = %response.status(), "Webhook notification sent");
        Ok(())
    }
}

/// Fan out to several sinks; one failing sink does not stop the others.
pub struct MultiSink {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl NotificationSink for MultiSink {
    fn name(&self) -> &str {
        "multi"
    }

    async fn notify(
        &self,
        decision: &EscalationDecision,
        report: &Report,
    ) -> Result<(), NotifyError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.notify(decision, report).await {
                warn!(sink = sink.name(), error = %e, "Sink failed");
                errors.push(e.to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::new("multi", errors.join("; ")))
        }
    }
}
