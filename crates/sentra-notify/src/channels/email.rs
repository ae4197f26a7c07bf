use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use sentra_common::types::ChannelType;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{NotifyError, Result};
use crate::format::{format_body, format_subject};
use crate::payload::AlertPayload;
use crate::plugin::ChannelPlugin;
use crate::utils::{truncate_string, MAX_BODY_LENGTH};
use crate::{NotificationChannel, SendResponse};

pub struct EmailChannel {
    instance_id: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl EmailChannel {
    pub fn new(
        instance_id: &str,
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            instance_id: instance_id.to_string(),
            transport: builder.build(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    async fn send(&self, alert: &AlertPayload, recipient: &str) -> Result<SendResponse> {
        let subject = format_subject(alert);
        let body = format_body(alert);

        let request_body = serde_json::json!({
            "from": self.from,
            "to": recipient,
            "subject": subject,
            "body": body,
        });
        let request_body = truncate_string(&request_body.to_string(), MAX_BODY_LENGTH);

        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| NotifyError::InvalidConfig(format!("from address: {e}")))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| NotifyError::InvalidRecipient(format!("{recipient}: {e}")))?)
            .subject(&subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        let mut last_err = None;
        let mut attempts = 0u32;
        for attempt in 0..3 {
            attempts = attempt + 1;
            match self.transport.send(email.clone()).await {
                Ok(_) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempts,
                        recipient = %recipient,
                        error = %e,
                        "Email send failed, retrying"
                    );
                    last_err = Some(e);
                    if attempt < 2 {
                        tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
                    }
                }
            }
        }

        if let Some(e) = last_err {
            return Err(NotifyError::Smtp(e.to_string()));
        }

        Ok(SendResponse {
            request_body: Some(request_body),
            retry_count: attempts.saturating_sub(1),
            ..Default::default()
        })
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Email
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

// Plugin

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from: String,
}

pub struct EmailPlugin;

impl ChannelPlugin for EmailPlugin {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Email
    }

    fn recipient_kind(&self) -> &'static str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<EmailConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))?;
        let channel = EmailChannel::new(
            instance_id,
            &cfg.smtp_host,
            cfg.smtp_port,
            cfg.smtp_username.as_deref(),
            cfg.smtp_password.as_deref(),
            &cfg.from,
        )?;
        Ok(Box::new(channel))
    }

    fn redact_config(&self, config: &Value) -> Value {
        let mut redacted = config.clone();
        if let Some(obj) = redacted.as_object_mut() {
            if obj.contains_key("smtp_password") {
                obj.insert(
                    "smtp_password".to_string(),
                    Value::String("***".to_string()),
                );
            }
        }
        redacted
    }
}
