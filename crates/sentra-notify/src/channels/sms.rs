use async_trait::async_trait;
use sentra_common::types::ChannelType;
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

/// SMS gateway channel. The recipient is a phone number; the gateway URL
/// and API key come from the channel config.
pub struct SmsChannel {
    instance_id: String,
    client: reqwest::Client,
    gateway_url: String,
    api_key: String,
}

impl SmsChannel {
    pub fn new(instance_id: &str, gateway_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            client,
            gateway_url: gateway_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    async fn send(&self, alert: &AlertPayload, recipient: &str) -> Result<SendResponse> {
        let message = format_compact(alert);
        let payload = serde_json::json!({
            "to": recipient,
            "message": message,
        });

        let mut response = SendResponse {
            request_body: Some(truncate_string(&payload.to_string(), MAX_BODY_LENGTH)),
            ..Default::default()
        };

        let mut last_err: Option<NotifyError> = None;
        let mut attempts = 0u32;
        for attempt in 0..3u32 {
            attempts = attempt + 1;
            match self
                .client
                .post(&self.gateway_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    response.http_status = Some(status.as_u16());
                    let body = resp.text().await.unwrap_or_default();
                    response.response_body = Some(truncate_string(&body, MAX_BODY_LENGTH));

                    if status.is_success() {
                        last_err = None;
                        break;
                    }
                    tracing::warn!(
                        attempt = attempts,
                        recipient = %recipient,
                        status = %status,
                        "SMS gateway returned error, retrying"
                    );
                    last_err = Some(NotifyError::Api {
                        service: "sms",
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempts,
                        recipient = %recipient,
                        error = %e,
                        "SMS send failed, retrying"
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
        ChannelType::Sms
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
struct SmsConfig {
    gateway_url: String,
    api_key: String,
}

pub struct SmsPlugin;

impl ChannelPlugin for SmsPlugin {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Sms
    }

    fn recipient_kind(&self) -> &'static str {
        "phone"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<SmsConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("sms: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: SmsConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("sms: {e}")))?;
        Ok(Box::new(SmsChannel::new(
            instance_id,
            &cfg.gateway_url,
            &cfg.api_key,
        )?))
    }

    fn redact_config(&self, config: &Value) -> Value {
        crate::utils::redact_sensitive_json(config)
    }
}
