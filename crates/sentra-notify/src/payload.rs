use chrono::{DateTime, Utc};
use sentra_common::types::{Alert, Severity};
use serde::Serialize;
use serde_json::Value;

/// The logical notification payload every channel renders into its own wire
/// format: alert identity, human-readable title/message, severity, and the
/// numbers behind the decision.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub alert_id: String,
    pub workspace_id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metric_value: f64,
    pub threshold_value: f64,
    pub triggered_at: DateTime<Utc>,
    pub context: Value,
}

impl AlertPayload {
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            alert_id: alert.id.clone(),
            workspace_id: alert.workspace_id.clone(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            severity: alert.severity,
            metric_value: alert.metric_value,
            threshold_value: alert.threshold_value,
            triggered_at: alert.triggered_at,
            context: alert.context.clone(),
        }
    }

    /// Payload for an escalation notification: same alert, message
    /// annotated with the level being applied.
    pub fn escalated(alert: &Alert, level: i32) -> Self {
        let mut payload = Self::from_alert(alert);
        payload.message = format!("[escalated to level {level}] {}", alert.message);
        payload
    }
}

impl From<&Alert> for AlertPayload {
    fn from(alert: &Alert) -> Self {
        Self::from_alert(alert)
    }
}
