/// Errors that can occur within the notification subsystem.
///
/// Per-target delivery errors are recorded and aggregated by the
/// dispatcher; they never abort sibling targets.
///
/// # Examples
///
/// ```rust
/// use sentra_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp_host".to_string());
/// assert!(err.to_string().contains("smtp_host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// No plugin is registered for the requested channel type.
    #[error("Notify: no plugin registered for channel type '{0}'")]
    UnregisteredChannelType(String),

    /// The recipient value does not parse for this channel kind.
    #[error("Notify: invalid recipient: {0}")]
    InvalidRecipient(String),

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// JSON serialization or deserialization failed.
    #[error("Notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external API answered with a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The delivery attempt exceeded the channel's timeout.
    #[error("Notify: delivery timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Writing a notification history record failed.
    #[error("Notify: history write failed: {0}")]
    History(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
