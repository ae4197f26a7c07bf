use async_trait::async_trait;
use sentra_common::types::ChannelType;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{NotifyError, Result};
use crate::payload::AlertPayload;
use crate::plugin::ChannelPlugin;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::{NotificationChannel, SendResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Generic webhook channel. The recipient is the target URL; the body is
/// either a user-supplied `{{placeholder}}` template or the default JSON
/// rendering of the logical payload.
pub struct WebhookChannel {
    instance_id: String,
    client: reqwest::Client,
    body_template: Option<String>,
}

impl WebhookChannel {
    pub fn new(instance_id: &str, body_template: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            client,
            body_template,
        })
    }

    fn render_body(&self, alert: &AlertPayload) -> String {
        if let Some(template) = &self.body_template {
            template
                .replace("{{alert_id}}", &alert.alert_id)
                .replace("{{workspace_id}}", &alert.workspace_id)
                .replace("{{title}}", &alert.title)
                .replace("{{message}}", &alert.message)
                .replace("{{severity}}", &alert.severity.to_string())
                .replace("{{value}}", &format!("{:.2}", alert.metric_value))
                .replace("{{threshold}}", &format!("{:.2}", alert.threshold_value))
                .replace("{{timestamp}}", &alert.triggered_at.to_rfc3339())
        } else {
            serde_json::json!({
                "alert_id": alert.alert_id,
                "workspace_id": alert.workspace_id,
                "title": alert.title,
                "message": alert.message,
                "severity": alert.severity.to_string(),
                "metric_value": alert.metric_value,
                "threshold_value": alert.threshold_value,
                "triggered_at": alert.triggered_at.to_rfc3339(),
                "context": alert.context,
            })
            .to_string()
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &AlertPayload, recipient: &str) -> Result<SendResponse> {
        let body = self.render_body(alert);
        let mut response = SendResponse {
            request_body: Some(truncate_string(&body, MAX_BODY_LENGTH)),
            ..Default::default()
        };

        let mut last_err: Option<NotifyError> = None;
        let mut attempts = 0u32;
        for attempt in 0..3u32 {
            attempts = attempt + 1;
            match self
                .client
                .post(recipient)
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    response.http_status = Some(status.as_u16());

                    let resp_body = match resp.text().await {
                        Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
                        Err(e) => format!("[failed to read response body: {e}]"),
                    };
                    response.response_body = Some(resp_body.clone());

                    if status.is_success() {
                        last_err = None;
                        break;
                    }
                    tracing::warn!(
                        attempt = attempts,
                        status = %status,
                        "Webhook returned non-success status, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "webhook",
                        status: status.as_u16(),
                        body: resp_body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempts,
                        error = %e,
                        "Webhook send failed, retrying"
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
        ChannelType::Webhook
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn timeout(&self) -> Duration {
        // Three attempts with backoff have to fit inside the dispatcher's
        // bound, so this is wider than one request timeout.
        Duration::from_secs(4)
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    body_template: Option<String>,
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Webhook
    }

    fn recipient_kind(&self) -> &'static str {
        "webhook_url"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<WebhookConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        Ok(Box::new(WebhookChannel::new(
            instance_id,
            cfg.body_template,
        )?))
    }
}
