use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use sentra_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert_eq!(sev.to_string(), "warning");
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// The kind of condition a rule evaluates. Closed set; every variant has a
/// registered evaluator, so match sites are checked at compile time instead
/// of dispatching on raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    Threshold,
    Change,
    Anomaly,
    Pattern,
}

impl ConditionType {
    pub const ALL: [ConditionType; 4] = [
        ConditionType::Threshold,
        ConditionType::Change,
        ConditionType::Anomaly,
        ConditionType::Pattern,
    ];
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Threshold => write!(f, "threshold"),
            ConditionType::Change => write!(f, "change"),
            ConditionType::Anomaly => write!(f, "anomaly"),
            ConditionType::Pattern => write!(f, "pattern"),
        }
    }
}

impl std::str::FromStr for ConditionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "threshold" => Ok(ConditionType::Threshold),
            "change" => Ok(ConditionType::Change),
            "anomaly" => Ok(ConditionType::Anomaly),
            "pattern" => Ok(ConditionType::Pattern),
            _ => Err(format!("unknown condition type: {s}")),
        }
    }
}

/// Notification delivery mechanism. Closed set mirroring the channel
/// implementations registered in the notify crate's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Chat,
    Webhook,
    Sms,
    Pager,
}

impl ChannelType {
    pub const ALL: [ChannelType; 5] = [
        ChannelType::Email,
        ChannelType::Chat,
        ChannelType::Webhook,
        ChannelType::Sms,
        ChannelType::Pager,
    ];
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Email => write!(f, "email"),
            ChannelType::Chat => write!(f, "chat"),
            ChannelType::Webhook => write!(f, "webhook"),
            ChannelType::Sms => write!(f, "sms"),
            ChannelType::Pager => write!(f, "pager"),
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(ChannelType::Email),
            "chat" => Ok(ChannelType::Chat),
            "webhook" => Ok(ChannelType::Webhook),
            "sms" => Ok(ChannelType::Sms),
            "pager" => Ok(ChannelType::Pager),
            _ => Err(format!("unknown channel type: {s}")),
        }
    }
}

/// One observed value of a metric, scoped to a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub workspace_id: String,
    pub metric_type: String,
    pub value: f64,
}

/// A persisted monitoring rule: what to watch, how to decide it fired, and
/// where to deliver the resulting alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub metric_type: String,
    pub condition_type: ConditionType,
    /// Opaque parameters interpreted by the matching condition evaluator.
    pub config: Value,
    pub check_interval_minutes: i64,
    pub cooldown_minutes: i64,
    pub severity: Severity,
    /// Notification channel row IDs to deliver to when this rule fires.
    pub channel_ids: Vec<String>,
    pub escalation_policy_id: Option<String>,
    pub enabled: bool,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Whether this rule is due for re-evaluation at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_evaluated_at {
            None => true,
            Some(last) => now - last >= Duration::minutes(self.check_interval_minutes),
        }
    }

    /// Whether this rule is still inside the quiet period armed by its last
    /// firing. Reads the durable `last_triggered_at`, so the cooldown
    /// survives restarts and is shared by every engine instance on the
    /// same store.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered_at {
            None => false,
            Some(fired) => now - fired < Duration::minutes(self.cooldown_minutes),
        }
    }
}

/// One firing instance of a rule, carrying its own acknowledgment,
/// resolution, and escalation lifecycle. Never deleted; resolution is
/// terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub workspace_id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub metric_value: f64,
    pub threshold_value: f64,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub escalated: bool,
    /// Monotonically non-decreasing; 0 until the first escalation applies.
    pub escalation_level: i32,
    pub notification_sent: bool,
    /// Raw evaluation context captured at creation, for audit and debugging.
    pub context: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// What an active suppression window matches on. First active match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SuppressionPattern {
    RuleId(String),
    MetricType(String),
    Severity(Severity),
}

impl SuppressionPattern {
    pub fn kind(&self) -> &'static str {
        match self {
            SuppressionPattern::RuleId(_) => "rule_id",
            SuppressionPattern::MetricType(_) => "metric_type",
            SuppressionPattern::Severity(_) => "severity",
        }
    }

    pub fn value_string(&self) -> String {
        match self {
            SuppressionPattern::RuleId(id) => id.clone(),
            SuppressionPattern::MetricType(m) => m.clone(),
            SuppressionPattern::Severity(sev) => sev.to_string(),
        }
    }

    /// Reconstructs a pattern from its stored (kind, value) columns.
    pub fn from_parts(kind: &str, value: &str) -> Result<Self, String> {
        match kind {
            "rule_id" => Ok(SuppressionPattern::RuleId(value.to_string())),
            "metric_type" => Ok(SuppressionPattern::MetricType(value.to_string())),
            "severity" => Ok(SuppressionPattern::Severity(value.parse()?)),
            _ => Err(format!("unknown suppression pattern kind: {kind}")),
        }
    }

    pub fn matches(&self, rule: &Rule) -> bool {
        match self {
            SuppressionPattern::RuleId(id) => *id == rule.id,
            SuppressionPattern::MetricType(m) => *m == rule.metric_type,
            SuppressionPattern::Severity(sev) => *sev == rule.severity,
        }
    }
}

/// A time-bounded silence window. While active, alert creation is skipped
/// for rules the pattern matches; the rule's own cooldown is untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suppression {
    pub id: String,
    pub workspace_id: String,
    pub pattern: SuppressionPattern,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Suppression {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

/// One step of an escalation ladder: after `delay_minutes` since the alert
/// triggered, notify `channel_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationLevel {
    pub level: i32,
    pub delay_minutes: i64,
    pub channel_ids: Vec<String>,
}

/// An ordered set of time-delayed notification levels applied to an
/// unacknowledged, unresolved alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub levels: Vec<EscalationLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscalationPolicy {
    /// The lowest-numbered level strictly above `current_level` whose delay
    /// has elapsed. Levels are never skipped: even if several delays have
    /// passed, the caller advances one level per check.
    pub fn next_eligible(&self, current_level: i32, elapsed: Duration) -> Option<&EscalationLevel> {
        self.levels
            .iter()
            .filter(|l| l.level > current_level && elapsed >= Duration::minutes(l.delay_minutes))
            .min_by_key(|l| l.level)
    }
}

/// A configured notification channel instance: the channel kind plus its
/// provider settings and recipient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub channel_type: ChannelType,
    /// Alerts below this severity are not delivered through this channel.
    pub min_severity: Severity,
    pub enabled: bool,
    /// Provider settings validated by the matching channel plugin.
    pub config: Value,
    pub recipients: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("unknown delivery status: {s}")),
        }
    }
}

/// One row of notification history: a single (alert, channel, recipient)
/// delivery attempt. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub alert_id: String,
    pub channel_id: String,
    pub channel_type: ChannelType,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    /// Provider response metadata (HTTP status, truncated body, message id).
    pub response_meta: Option<String>,
    pub retry_count: i32,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}
