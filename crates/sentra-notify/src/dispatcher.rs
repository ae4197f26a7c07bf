use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use sentra_common::types::{ChannelConfig, ChannelType, DeliveryStatus, NotificationRecord};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{NotifyError, Result};
use crate::payload::AlertPayload;
use crate::plugin::ChannelRegistry;
use crate::{NotificationChannel, SendResponse};

/// Outcome of one (channel, recipient) delivery task.
#[derive(Debug)]
pub struct TargetOutcome {
    pub channel_id: String,
    pub channel_type: ChannelType,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub response: Option<SendResponse>,
    pub retry_count: u32,
    pub duration_ms: i64,
}

/// Aggregated result of one dispatch: how many targets were attempted and
/// how each fared. One failing target never hides the others.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub total_targets: usize,
    pub successful: usize,
    pub failed: usize,
    pub targets: Vec<TargetOutcome>,
}

/// Where the dispatcher appends one history row per delivery attempt.
/// The storage layer adapts its notification-record store to this.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, record: &NotificationRecord) -> Result<()>;
}

/// The dispatch seam the alert engine depends on; implemented by
/// [`NotificationDispatcher`] and by stubs in engine tests.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn dispatch(&self, alert: &AlertPayload, channels: &[ChannelConfig]) -> DeliveryReport;
}

/// Expands channel configurations into per-(channel, recipient) delivery
/// tasks, runs them concurrently with independent timeouts, and joins them
/// with a barrier that tolerates individual failures and panics.
pub struct NotificationDispatcher {
    registry: ChannelRegistry,
    history: Arc<dyn HistorySink>,
}

impl NotificationDispatcher {
    pub fn new(registry: ChannelRegistry, history: Arc<dyn HistorySink>) -> Self {
        Self { registry, history }
    }

    async fn record_outcome(&self, alert: &AlertPayload, outcome: &TargetOutcome) {
        let response_meta = outcome.response.as_ref().map(|resp| {
            serde_json::json!({
                "http_status": resp.http_status,
                "response_body": resp.response_body,
                "provider_message_id": resp.provider_message_id,
            })
            .to_string()
        });
        let record = NotificationRecord {
            id: sentra_common::id::next_id(),
            alert_id: alert.alert_id.clone(),
            channel_id: outcome.channel_id.clone(),
            channel_type: outcome.channel_type,
            recipient: outcome.recipient.clone(),
            status: outcome.status,
            error: outcome.error.clone(),
            response_meta,
            retry_count: outcome.retry_count as i32,
            duration_ms: outcome.duration_ms,
            created_at: Utc::now(),
        };
        if let Err(e) = self.history.record(&record).await {
            tracing::error!(
                alert_id = %alert.alert_id,
                channel_id = %record.channel_id,
                error = %e,
                "Failed to write notification history"
            );
        }
    }
}

/// One spawned delivery attempt, bounded by the channel's own timeout.
async fn deliver(
    channel: Arc<dyn NotificationChannel>,
    alert: Arc<AlertPayload>,
    channel_id: String,
    recipient: String,
) -> TargetOutcome {
    let channel_type = channel.channel_type();
    let timeout = channel.timeout();
    let started = Instant::now();

    let result = tokio::time::timeout(timeout, channel.send(&alert, &recipient)).await;
    let duration_ms = started.elapsed().as_millis() as i64;

    match result {
        Ok(Ok(response)) => TargetOutcome {
            channel_id,
            channel_type,
            recipient,
            status: DeliveryStatus::Sent,
            error: None,
            retry_count: response.retry_count,
            response: Some(response),
            duration_ms,
        },
        Ok(Err(e)) => {
            tracing::warn!(
                channel_id = %channel_id,
                recipient = %recipient,
                error = %e,
                "Delivery failed"
            );
            TargetOutcome {
                channel_id,
                channel_type,
                recipient,
                status: DeliveryStatus::Failed,
                error: Some(e.to_string()),
                response: None,
                retry_count: 0,
                duration_ms,
            }
        }
        Err(_) => {
            let e = NotifyError::Timeout {
                seconds: timeout.as_secs(),
            };
            tracing::warn!(
                channel_id = %channel_id,
                recipient = %recipient,
                timeout_secs = timeout.as_secs(),
                "Delivery timed out"
            );
            TargetOutcome {
                channel_id,
                channel_type,
                recipient,
                status: DeliveryStatus::Failed,
                error: Some(e.to_string()),
                response: None,
                retry_count: 0,
                duration_ms,
            }
        }
    }
}

#[async_trait]
impl AlertDispatcher for NotificationDispatcher {
    async fn dispatch(&self, alert: &AlertPayload, channels: &[ChannelConfig]) -> DeliveryReport {
        let payload = Arc::new(alert.clone());
        let mut outcomes: Vec<TargetOutcome> = Vec::new();
        let mut tasks = Vec::new();
        // (channel_id, channel_type, recipient) kept alongside each handle
        // so a panicked task still yields an attributable outcome.
        let mut task_meta: Vec<(String, ChannelType, String)> = Vec::new();

        for cfg in channels {
            if !cfg.enabled {
                tracing::debug!(channel_id = %cfg.id, "Channel disabled, skipping");
                continue;
            }
            if alert.severity < cfg.min_severity {
                tracing::debug!(
                    channel_id = %cfg.id,
                    severity = %alert.severity,
                    min_severity = %cfg.min_severity,
                    "Alert below channel's minimum severity, skipping"
                );
                continue;
            }

            let channel: Arc<dyn NotificationChannel> =
                match self
                    .registry
                    .create_channel(cfg.channel_type, &cfg.id, &cfg.config)
                {
                    Ok(boxed) => Arc::from(boxed),
                    Err(e) => {
                        // A channel that cannot be instantiated still gets
                        // one recorded failure per recipient.
                        tracing::error!(
                            channel_id = %cfg.id,
                            error = %e,
                            "Failed to create notification channel"
                        );
                        for recipient in &cfg.recipients {
                            outcomes.push(TargetOutcome {
                                channel_id: cfg.id.clone(),
                                channel_type: cfg.channel_type,
                                recipient: recipient.clone(),
                                status: DeliveryStatus::Failed,
                                error: Some(e.to_string()),
                                response: None,
                                retry_count: 0,
                                duration_ms: 0,
                            });
                        }
                        continue;
                    }
                };

            for recipient in &cfg.recipients {
                task_meta.push((cfg.id.clone(), cfg.channel_type, recipient.clone()));
                tasks.push(tokio::spawn(deliver(
                    Arc::clone(&channel),
                    Arc::clone(&payload),
                    cfg.id.clone(),
                    recipient.clone(),
                )));
            }
        }

        // Barrier: wait for every target; a panic in one task becomes a
        // failed outcome for that target only.
        for (result, (channel_id, channel_type, recipient)) in
            join_all(tasks).await.into_iter().zip(task_meta)
        {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(TargetOutcome {
                    channel_id,
                    channel_type,
                    recipient,
                    status: DeliveryStatus::Failed,
                    error: Some(format!("delivery task panicked: {e}")),
                    response: None,
                    retry_count: 0,
                    duration_ms: 0,
                }),
            }
        }

        // Every attempt lands in history, whatever its outcome.
        for outcome in &outcomes {
            self.record_outcome(alert, outcome).await;
        }

        let successful = outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Sent)
            .count();
        let report = DeliveryReport {
            total_targets: outcomes.len(),
            successful,
            failed: outcomes.len() - successful,
            targets: outcomes,
        };
        tracing::info!(
            alert_id = %alert.alert_id,
            total = report.total_targets,
            successful = report.successful,
            failed = report.failed,
            "Notification dispatch complete"
        );
        report
    }
}
