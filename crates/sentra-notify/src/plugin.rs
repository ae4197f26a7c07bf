use sentra_common::types::ChannelType;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{NotifyError, Result};
use crate::NotificationChannel;

/// Factory for creating [`NotificationChannel`] instances from JSON
/// configuration.
///
/// Each plugin is registered in the [`ChannelRegistry`] under its
/// [`ChannelType`]. When the dispatcher expands a channel config into
/// delivery tasks, the registry validates and instantiates the channel
/// through the matching plugin.
pub trait ChannelPlugin: Send + Sync {
    fn channel_type(&self) -> ChannelType;

    /// Describes the kind of recipient this channel accepts
    /// (e.g. `"email"`, `"phone"`, `"webhook_url"`, `"routing_key"`).
    fn recipient_kind(&self) -> &'static str;

    /// Validates a JSON config blob against this plugin's expected schema.
    fn validate_config(&self, config: &Value) -> Result<()>;

    /// Creates a configured channel instance from a validated JSON config.
    /// `instance_id` is the channel row ID identifying this instance.
    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>>;

    /// Returns a copy of `config` with secrets redacted, for display.
    fn redact_config(&self, config: &Value) -> Value {
        config.clone()
    }
}

/// Registry of available [`ChannelPlugin`]s, keyed by the closed
/// [`ChannelType`] enum.
///
/// # Examples
///
/// ```
/// use sentra_common::types::ChannelType;
/// use sentra_notify::plugin::ChannelRegistry;
///
/// let registry = ChannelRegistry::default();
/// for ct in ChannelType::ALL {
///     assert!(registry.has_plugin(ct));
/// }
/// ```
pub struct ChannelRegistry {
    plugins: HashMap<ChannelType, Box<dyn ChannelPlugin>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ChannelPlugin>) {
        self.plugins.insert(plugin.channel_type(), plugin);
    }

    pub fn create_channel(
        &self,
        channel_type: ChannelType,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let plugin = self
            .plugins
            .get(&channel_type)
            .ok_or_else(|| NotifyError::UnregisteredChannelType(channel_type.to_string()))?;
        plugin.validate_config(config)?;
        plugin.create_channel(instance_id, config)
    }

    pub fn get_plugin(&self, channel_type: ChannelType) -> Option<&dyn ChannelPlugin> {
        self.plugins.get(&channel_type).map(|p| p.as_ref())
    }

    pub fn has_plugin(&self, channel_type: ChannelType) -> bool {
        self.plugins.contains_key(&channel_type)
    }

    pub fn channel_types(&self) -> Vec<ChannelType> {
        self.plugins.keys().copied().collect()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::channels::email::EmailPlugin));
        registry.register(Box::new(crate::channels::chat::ChatPlugin));
        registry.register(Box::new(crate::channels::webhook::WebhookPlugin));
        registry.register(Box::new(crate::channels::sms::SmsPlugin));
        registry.register(Box::new(crate::channels::pager::PagerPlugin));
        registry
    }
}
