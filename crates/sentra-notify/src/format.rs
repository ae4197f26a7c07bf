//! Message formatting shared by all channel types. Channel-specific
//! templating (markdown cards, JSON payloads) layers on top of these.

use crate::payload::AlertPayload;

/// Severity-coded subject line, e.g. `[sentra][critical] High CPU`.
pub fn format_subject(alert: &AlertPayload) -> String {
    format!("[sentra][{}] {}", alert.severity, alert.title)
}

/// Plain-text body listing the numbers behind the alert.
pub fn format_body(alert: &AlertPayload) -> String {
    format!(
        "Alert: {severity}\nWorkspace: {workspace}\nTitle: {title}\nValue: {value:.2}\nThreshold: {threshold:.2}\nTriggered: {triggered}\nMessage: {message}",
        severity = alert.severity,
        workspace = alert.workspace_id,
        title = alert.title,
        value = alert.metric_value,
        threshold = alert.threshold_value,
        triggered = alert.triggered_at.to_rfc3339(),
        message = alert.message,
    )
}

/// One-line summary for length-constrained channels (SMS, paging).
pub fn format_compact(alert: &AlertPayload) -> String {
    format!(
        "[sentra][{severity}] {title}: {message} (value {value:.2}, threshold {threshold:.2})",
        severity = alert.severity,
        title = alert.title,
        message = alert.message,
        value = alert.metric_value,
        threshold = alert.threshold_value,
    )
}
