use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sentra_common::types::ChannelType;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

use crate::error::{NotifyError, Result};
use crate::format::format_subject;
use crate::payload::AlertPayload;
use crate::plugin::ChannelPlugin;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::{NotificationChannel, SendResponse};

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Chat webhook channel posting a markdown card. The recipient is the bot
/// webhook URL; providers that require signed requests get an HMAC-SHA256
/// timestamp signature appended to the URL.
pub struct ChatChannel {
    instance_id: String,
    client: reqwest::Client,
    secret: Option<String>,
}

impl ChatChannel {
    pub fn new(instance_id: &str, secret: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            instance_id: instance_id.to_string(),
            client,
            secret,
        })
    }

    fn sign_url(&self, base_url: &str) -> String {
        let Some(secret) = &self.secret else {
            return base_url.to_string();
        };

        let timestamp = chrono::Utc::now().timestamp_millis();
        let string_to_sign = format!("{timestamp}\n{secret}");

        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        let sign = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        let sign_encoded = urlencoding::encode(&sign);

        let sep = if base_url.contains('?') { '&' } else { '?' };
        format!("{base_url}{sep}timestamp={timestamp}&sign={sign_encoded}")
    }

    fn format_markdown(alert: &AlertPayload) -> (String, String) {
        let title = format_subject(alert);
        let text = format!(
            "### {title}\n\n\
             - **Severity**: {severity}\n\
             - **Workspace**: {workspace}\n\
             - **Value**: {value:.2}\n\
             - **Threshold**: {threshold:.2}\n\
             - **Time**: {time}\n\n\
             > {message}",
            title = title,
            severity = alert.severity,
            workspace = alert.workspace_id,
            value = alert.metric_value,
            threshold = alert.threshold_value,
            time = alert.triggered_at.to_rfc3339(),
            message = alert.message,
        );
        (title, text)
    }
}

#[async_trait]
impl NotificationChannel for ChatChannel {
    async fn send(&self, alert: &AlertPayload, recipient: &str) -> Result<SendResponse> {
        let (title, text) = Self::format_markdown(alert);
        let payload = serde_json::json!({
            "msgtype": "markdown",
            "markdown": { "title": title, "text": text },
        });
        let url = self.sign_url(recipient);

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
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => {
                    let status = resp.status();
                    response.http_status = Some(status.as_u16());

                    if status.is_success() {
                        // Chat providers report application errors inside a
                        // 200 body as a non-zero errcode.
                        match resp.json::<Value>().await {
                            Ok(body) => {
                                response.response_body = Some(truncate_string(
                                    &body.to_string(),
                                    MAX_BODY_LENGTH,
                                ));
                                let errcode = body.get("errcode").and_then(|v| v.as_i64());
                                if errcode.is_none() || errcode == Some(0) {
                                    last_err = None;
                                    break;
                                }
                                tracing::warn!(
                                    attempt = attempts,
                                    errcode = errcode.unwrap_or(-1),
                                    "Chat provider rejected message, retrying"
                                );
                                last_err = Some(NotifyError::Api {
                                    service: "chat",
                                    status: status.as_u16(),
                                    body: body.to_string(),
                                });
                            }
                            Err(_) => {
                                // Not JSON; a 2xx status is good enough.
                                last_err = None;
                                break;
                            }
                        }
                    } else {
                        let body = resp.text().await.unwrap_or_default();
                        response.response_body =
                            Some(truncate_string(&body, MAX_BODY_LENGTH));
                        tracing::warn!(
                            attempt = attempts,
                            status = %status,
                            "Chat webhook returned non-success status, retrying"
                        );
                        last_err = Some(NotifyError::Api {
                            service: "chat",
                            status: status.as_u16(),
                            body,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempts,
                        error = %e,
                        "Chat webhook send failed, retrying"
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
        ChannelType::Chat
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
struct ChatConfig {
    /// Optional HMAC signing secret for providers that require it.
    secret: Option<String>,
}

pub struct ChatPlugin;

impl ChannelPlugin for ChatPlugin {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Chat
    }

    fn recipient_kind(&self) -> &'static str {
        "webhook_url"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<ChatConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("chat: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: ChatConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("chat: {e}")))?;
        Ok(Box::new(ChatChannel::new(instance_id, cfg.secret)?))
    }

    fn redact_config(&self, config: &Value) -> Value {
        crate::utils::redact_sensitive_json(config)
    }
}
