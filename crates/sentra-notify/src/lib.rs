//! Notification delivery framework with pluggable channel support.
//!
//! Alerts are fanned out to one or more [`NotificationChannel`]
//! implementations, one delivery task per (channel, recipient) pair.
//! Built-in channels cover email (SMTP), chat webhooks, generic webhooks,
//! SMS gateways, and paging providers. The [`dispatcher::NotificationDispatcher`]
//! runs all targets concurrently, bounds each with the channel's timeout,
//! and records every attempt to notification history.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod payload;
pub mod plugin;
pub mod utils;


use async_trait::async_trait;
use sentra_common::types::ChannelType;
use std::time::Duration;

use crate::error::Result;
use crate::payload::AlertPayload;

/// Response metadata captured from one delivery attempt, persisted alongside
/// the outcome in notification history.
#[derive(Debug, Clone, Default)]
pub struct SendResponse {
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
    pub request_body: Option<String>,
    /// Provider-assigned message or dedup identifier, when one is returned.
    pub provider_message_id: Option<String>,
    /// Attempts beyond the first that were needed to get an answer.
    pub retry_count: u32,
}

/// A notification delivery channel that sends one alert to one recipient
/// through an external service (SMTP relay, webhook endpoint, SMS gateway,
/// paging provider).
///
/// Implementations are created by the corresponding [`plugin::ChannelPlugin`]
/// from a validated JSON config. What a "recipient" is depends on the
/// channel: an address for email, a phone number for SMS, a webhook URL for
/// chat/webhook channels, a routing key for paging.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the alert to a single recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after the channel's internal
    /// retries. One recipient failing never affects other recipients; the
    /// dispatcher aggregates per-target outcomes.
    async fn send(&self, alert: &AlertPayload, recipient: &str) -> Result<SendResponse>;

    fn channel_type(&self) -> ChannelType;

    /// The channel row ID this instance was built from.
    fn instance_id(&self) -> &str;

    /// Upper bound the dispatcher applies to one delivery attempt. A slow
    /// provider can only stall its own targets, never the whole dispatch.
    fn timeout(&self) -> Duration {
        Duration::from_secs(3)
    }
}
