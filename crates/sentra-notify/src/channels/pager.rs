use async_trait::async_trait;
use sentra_common::types::{ChannelType, Severity};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{NotifyError, Result};
use crate::format::format_compact;
use crate::payload::AlertPayload;
use crate::plugin::ChannelPlugin;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::{NotificationChannel, SendResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Paging provider channel (events-API style). The recipient is the
/// integration routing key; the alert ID doubles as the dedup key so
/// repeated deliveries collapse into one open incident.
pub struct PagerChannel {
    instance_id: String,
    client: reqwest::Client,
    endpoint_url: String,
}

impl PagerChannel {
    pub fn new(instance_id: &str, endpoint_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            client,
            endpoint_url: endpoint_url.to_string(),
        })
    }

    fn event_severity(severity: Severity) -> &'static str {
        match severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

#[async_trait]
impl NotificationChannel for PagerChannel {
    async fn send(&self, alert: &AlertPayload, recipient: &str) -> Result<SendResponse> {
        let payload = serde_json::json!({
            "routing_key": recipient,
            "event_action": "trigger",
            "dedup_key": alert.alert_id,
            "payload": {
                "summary": format_compact(alert),
                "severity": Self::event_severity(alert.severity),
                "timestamp": alert.triggered_at.to_rfc3339(),
                "source": alert.workspace_id,
                "custom_details": alert.context,
            },
        });

        let mut response = SendResponse {
            request_body: Some(truncate_string(
                // The routing key is a credential; never persist it.
                &crate::utils::redact_sensitive_json(&payload).to_string(),
                MAX_BODY_LENGTH,
            )),
            ..Default::default()
        };

        let mut last_err: Option<NotifyError> = None;
        let mut attempts = 0u32;
        for attempt in 0..3u32 {
            attempts = attempt + 1;
            match self.client.post(&self.endpoint_url).json(&payload).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    response.http_status = Some(status.as_u16());

                    match resp.json::<Value>().await {
                        Ok(body) => {
                            response.response_body =
                                Some(truncate_string(&body.to_string(), MAX_BODY_LENGTH));
                            response.provider_message_id = body
                                .get("dedup_key")
                                .and_then(|v| v.as_str())
                                .map(|s| s.to_string());
                        }
                        Err(_) => {
                            response.response_body = None;
                        }
                    }

                    if status.is_success() {
                        last_err = None;
                        break;
                    }
                    tracing::warn!(
                        attempt = attempts,
                        status = %status,
                        "Paging provider returned error, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "pager",
                        status: status.as_u16(),
                        body: response.response_body.clone().unwrap_or_default(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempts,
                        error = %e,
                        "Pager send failed, retrying"
                    );
                    last_err = Some(e.into());
                }
            }
            if attempt < 2 {
                tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
            }
        }

        response.retry_count = attempts.saturating_sub(1);
        match last_err {
            Some(e) => Err(e),
            None => Ok(response),
        }
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Pager
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(4)
    }
}

// Plugin

#[derive(Deserialize)]
struct PagerConfig {
    endpoint_url: String,
}

pub struct PagerPlugin;

impl ChannelPlugin for PagerPlugin {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Pager
    }

    fn recipient_kind(&self) -> &'static str {
        "routing_key"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<PagerConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("pager: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: PagerConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("pager: {e}")))?;
        Ok(Box::new(PagerChannel::new(instance_id, &cfg.endpoint_url)?))
    }
}
