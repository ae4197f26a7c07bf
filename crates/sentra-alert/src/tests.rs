use crate::engine::AlertEngine;
use crate::error::{ConfigError, EngineError};
use crate::history::StoreHistorySink;
use crate::validate_condition_config;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sentra_common::types::{
    Alert, ChannelConfig, ChannelType, ConditionType, DeliveryStatus, EscalationLevel,
    EscalationPolicy, MetricSample, NotificationRecord, Rule, Severity, SuppressionPattern,
};
use sentra_notify::dispatcher::{AlertDispatcher, DeliveryReport, HistorySink};
use sentra_notify::payload::AlertPayload;
use sentra_storage::metrics::SqliteMetricStore;
use sentra_storage::store::CoreStore;
use sentra_storage::MetricStore;
use std::sync::{Arc, Mutex};

/// Dispatcher stub: records every call and reports one successful target
/// per configured recipient.
#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<(AlertPayload, Vec<String>)>>,
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn dispatch(&self, alert: &AlertPayload, channels: &[ChannelConfig]) -> DeliveryReport {
        let total: usize = channels.iter().map(|c| c.recipients.len()).sum();
        self.calls.lock().unwrap().push((
            alert.clone(),
            channels.iter().map(|c| c.id.clone()).collect(),
        ));
        DeliveryReport {
            total_targets: total,
            successful: total,
            failed: 0,
            targets: Vec::new(),
        }
    }
}

struct Harness {
    engine: AlertEngine,
    core: Arc<CoreStore>,
    metrics: Arc<SqliteMetricStore>,
    dispatcher: Arc<RecordingDispatcher>,
}

impl Harness {
    async fn new() -> Self {
        let core = Arc::new(CoreStore::connect("sqlite::memory:").await.unwrap());
        let metrics = Arc::new(SqliteMetricStore::open_in_memory().unwrap());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let metric_store: Arc<dyn MetricStore> = metrics.clone();
        let engine = AlertEngine::new(core.clone(), metric_store, dispatcher.clone());
        Self {
            engine,
            core,
            metrics,
            dispatcher,
        }
    }

    async fn seed_channel(&self, id: &str) {
        let now = Utc::now();
        self.core
            .insert_channel(&ChannelConfig {
                id: id.to_string(),
                workspace_id: "ws-1".to_string(),
                name: format!("channel {id}"),
                channel_type: ChannelType::Webhook,
                min_severity: Severity::Info,
                enabled: true,
                config: serde_json::json!({}),
                recipients: vec!["https://hooks.example.com/1".to_string()],
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn record_metric(&self, metric: &str, value: f64) {
        self.metrics
            .record(&MetricSample {
                timestamp: Utc::now(),
                workspace_id: "ws-1".to_string(),
                metric_type: metric.to_string(),
                value,
            })
            .unwrap();
    }

    async fn seed_alert(&self, id: &str, rule_id: &str, minutes_ago: i64) -> Alert {
        let now = Utc::now();
        self.core
            .insert_alert(&Alert {
                id: id.to_string(),
                rule_id: rule_id.to_string(),
                workspace_id: "ws-1".to_string(),
                title: "High CPU".to_string(),
                message: "cpu.usage is above 90.0".to_string(),
                severity: Severity::Critical,
                metric_value: 95.0,
                threshold_value: 90.0,
                triggered_at: now - Duration::minutes(minutes_ago),
                acknowledged_at: None,
                acknowledged_by: None,
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
                escalated: false,
                escalation_level: 0,
                notification_sent: false,
                context: serde_json::json!({}),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }
}

fn threshold_rule(id: &str) -> Rule {
    let now = Utc::now();
    Rule {
        id: id.to_string(),
        workspace_id: "ws-1".to_string(),
        name: "High CPU".to_string(),
        metric_type: "cpu.usage".to_string(),
        condition_type: ConditionType::Threshold,
        config: serde_json::json!({"operator": ">", "threshold": 90.0}),
        check_interval_minutes: 5,
        cooldown_minutes: 30,
        severity: Severity::Critical,
        channel_ids: vec!["ch-1".to_string()],
        escalation_policy_id: None,
        enabled: true,
        last_evaluated_at: None,
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn triggering_rule_creates_alert_and_arms_cooldown() {
    let h = Harness::new().await;
    h.seed_channel("ch-1").await;
    h.core.insert_rule(&threshold_rule("r-1")).await.unwrap();
    h.record_metric("cpu.usage", 95.21);

    let alerts = h.engine.evaluate_rules("ws-1").await.unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.title, "High CPU");
    assert!(alert.message.contains("above 90.0"));
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.metric_value, 95.21);
    assert_eq!(alert.threshold_value, 90.0);
    assert!(alert.notification_sent);

    assert_eq!(h.dispatcher.calls.lock().unwrap().len(), 1);

    let rule = h.core.get_rule("r-1").await.unwrap().unwrap();
    assert!(rule.last_evaluated_at.is_some());
    assert!(rule.last_triggered_at.is_some());
}

#[tokio::test]
async fn cooldown_prevents_repeat_alerts_while_condition_stays_true() {
    let h = Harness::new().await;
    h.seed_channel("ch-1").await;
    let mut rule = threshold_rule("r-1");
    rule.check_interval_minutes = 0; // always due; only the cooldown gates
    h.core.insert_rule(&rule).await.unwrap();
    h.record_metric("cpu.usage", 95.0);

    let first = h.engine.evaluate_rules("ws-1").await.unwrap();
    assert_eq!(first.len(), 1);

    // The condition is still true, but the rule just fired.
    let second = h.engine.evaluate_rules("ws-1").await.unwrap();
    assert!(second.is_empty());
    assert_eq!(h.dispatcher.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rule_not_yet_due_is_skipped() {
    let h = Harness::new().await;
    h.seed_channel("ch-1").await;
    let mut rule = threshold_rule("r-1");
    rule.cooldown_minutes = 0; // only the check interval gates
    rule.check_interval_minutes = 60;
    h.core.insert_rule(&rule).await.unwrap();
    h.record_metric("cpu.usage", 95.0);

    assert_eq!(h.engine.evaluate_rules("ws-1").await.unwrap().len(), 1);
    // Second pass inside the check interval: skipped, not re-evaluated.
    assert!(h.engine.evaluate_rules("ws-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn suppression_blocks_alert_creation_but_still_stamps_evaluation() {
    let h = Harness::new().await;
    h.seed_channel("ch-1").await;
    h.core.insert_rule(&threshold_rule("r-1")).await.unwrap();
    h.record_metric("cpu.usage", 95.0);

    h.engine
        .apply_suppression(
            SuppressionPattern::MetricType("cpu.usage".to_string()),
            "ws-1",
            60,
            Some("planned maintenance"),
        )
        .await
        .unwrap();

    let alerts = h.engine.evaluate_rules("ws-1").await.unwrap();
    assert!(alerts.is_empty());
    assert!(h.dispatcher.calls.lock().unwrap().is_empty());
    assert!(h
        .core
        .list_open_alerts("ws-1", 10, 0)
        .await
        .unwrap()
        .is_empty());

    let rule = h.core.get_rule("r-1").await.unwrap().unwrap();
    assert!(rule.last_evaluated_at.is_some());
    // The cooldown is not armed by a suppressed firing.
    assert!(rule.last_triggered_at.is_none());
}

#[tokio::test]
async fn one_bad_rule_does_not_abort_the_batch() {
    let h = Harness::new().await;
    h.seed_channel("ch-1").await;

    // Malformed config inserted behind the engine's back, as if written by
    // an older deployment.
    let mut bad = threshold_rule("r-bad");
    bad.config = serde_json::json!({"operator": "~", "threshold": "high"});
    h.core.insert_rule(&bad).await.unwrap();
    h.core.insert_rule(&threshold_rule("r-good")).await.unwrap();
    h.record_metric("cpu.usage", 95.0);

    let alerts = h.engine.evaluate_rules("ws-1").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_id, "r-good");

    // The broken rule was still stamped so it cannot hot-loop.
    let bad = h.core.get_rule("r-bad").await.unwrap().unwrap();
    assert!(bad.last_evaluated_at.is_some());
}

async fn seed_escalation(h: &Harness) {
    let now = Utc::now();
    h.seed_channel("ch-esc-1").await;
    h.seed_channel("ch-esc-2").await;
    h.core
        .insert_escalation_policy(&EscalationPolicy {
            id: "p-1".to_string(),
            workspace_id: "ws-1".to_string(),
            name: "oncall ladder".to_string(),
            levels: vec![
                EscalationLevel {
                    level: 1,
                    delay_minutes: 10,
                    channel_ids: vec!["ch-esc-1".to_string()],
                },
                EscalationLevel {
                    level: 2,
                    delay_minutes: 30,
                    channel_ids: vec!["ch-esc-2".to_string()],
                },
            ],
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
    let mut rule = threshold_rule("r-1");
    rule.escalation_policy_id = Some("p-1".to_string());
    h.core.insert_rule(&rule).await.unwrap();
}

#[tokio::test]
async fn escalation_waits_for_the_level_delay() {
    let h = Harness::new().await;
    seed_escalation(&h).await;
    h.seed_alert("a-young", "r-1", 5).await;

    assert!(!h.engine.check_escalation("a-young").await.unwrap());
    let alert = h.core.get_alert("a-young").await.unwrap().unwrap();
    assert_eq!(alert.escalation_level, 0);
    assert!(!alert.escalated);
}

#[tokio::test]
async fn escalation_advances_one_level_and_notifies_level_channels() {
    let h = Harness::new().await;
    seed_escalation(&h).await;
    h.seed_alert("a-1", "r-1", 15).await;

    assert!(h.engine.check_escalation("a-1").await.unwrap());
    let alert = h.core.get_alert("a-1").await.unwrap().unwrap();
    assert!(alert.escalated);
    assert_eq!(alert.escalation_level, 1);

    let calls = h.dispatcher.calls.lock().unwrap();
    let (payload, channel_ids) = calls.last().unwrap();
    assert!(payload.message.starts_with("[escalated to level 1]"));
    assert_eq!(channel_ids, &vec!["ch-esc-1".to_string()]);
    drop(calls);

    // Level 2 needs 30 minutes; a second check right away is a no-op.
    assert!(!h.engine.check_escalation("a-1").await.unwrap());
    let alert = h.core.get_alert("a-1").await.unwrap().unwrap();
    assert_eq!(alert.escalation_level, 1);
}

#[tokio::test]
async fn escalation_never_skips_levels_even_after_long_delays() {
    let h = Harness::new().await;
    seed_escalation(&h).await;
    // Old enough for both delays, yet each call advances exactly one level.
    h.seed_alert("a-old", "r-1", 35).await;

    assert!(h.engine.check_escalation("a-old").await.unwrap());
    assert_eq!(
        h.core
            .get_alert("a-old")
            .await
            .unwrap()
            .unwrap()
            .escalation_level,
        1
    );

    assert!(h.engine.check_escalation("a-old").await.unwrap());
    assert_eq!(
        h.core
            .get_alert("a-old")
            .await
            .unwrap()
            .unwrap()
            .escalation_level,
        2
    );

    // Top of the ladder.
    assert!(!h.engine.check_escalation("a-old").await.unwrap());
}

#[tokio::test]
async fn acknowledged_and_resolved_alerts_do_not_escalate() {
    let h = Harness::new().await;
    seed_escalation(&h).await;
    h.seed_alert("a-acked", "r-1", 35).await;
    h.engine.acknowledge("a-acked", "operator").await.unwrap();
    assert!(!h.engine.check_escalation("a-acked").await.unwrap());

    h.seed_alert("a-resolved", "r-1", 35).await;
    h.engine
        .resolve("a-resolved", "operator", None)
        .await
        .unwrap();
    assert!(!h.engine.check_escalation("a-resolved").await.unwrap());
}

#[tokio::test]
async fn alert_without_policy_never_escalates() {
    let h = Harness::new().await;
    h.core.insert_rule(&threshold_rule("r-1")).await.unwrap();
    h.seed_alert("a-1", "r-1", 500).await;
    assert!(!h.engine.check_escalation("a-1").await.unwrap());
}

#[tokio::test]
async fn check_escalation_on_unknown_alert_is_an_error() {
    let h = Harness::new().await;
    let err = h.engine.check_escalation("a-missing").await.err().unwrap();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn acknowledge_is_idempotent() {
    let h = Harness::new().await;
    h.core.insert_rule(&threshold_rule("r-1")).await.unwrap();
    h.seed_alert("a-1", "r-1", 1).await;

    let first = h.engine.acknowledge("a-1", "operator").await.unwrap();
    let second = h.engine.acknowledge("a-1", "someone-else").await.unwrap();
    assert_eq!(first.acknowledged_at, second.acknowledged_at);
    assert_eq!(second.acknowledged_by.as_deref(), Some("operator"));
}

#[tokio::test]
async fn resolve_is_idempotent_and_terminal() {
    let h = Harness::new().await;
    h.core.insert_rule(&threshold_rule("r-1")).await.unwrap();
    h.seed_alert("a-1", "r-1", 1).await;

    let first = h
        .engine
        .resolve("a-1", "operator", Some("restarted"))
        .await
        .unwrap();
    let second = h.engine.resolve("a-1", "other", None).await.unwrap();
    assert_eq!(first.resolved_at, second.resolved_at);
    assert_eq!(second.resolution_notes.as_deref(), Some("restarted"));

    // Acknowledging after resolution is accepted as a no-op.
    let acked = h.engine.acknowledge("a-1", "operator").await.unwrap();
    assert!(acked.acknowledged_at.is_none());
}

#[tokio::test]
async fn create_rule_rejects_invalid_condition_config() {
    let h = Harness::new().await;
    let mut rule = threshold_rule("r-1");
    rule.config = serde_json::json!({"operator": "~", "threshold": 1.0});

    let err = h.engine.create_rule(rule).await.err().unwrap();
    assert!(matches!(err, EngineError::Config(_)));

    // Nothing was persisted.
    assert!(h.core.get_rule("r-1").await.unwrap().is_none());

    let created = h.engine.create_rule(threshold_rule("r-1")).await.unwrap();
    assert_eq!(created.id, "r-1");
}

#[tokio::test]
async fn store_history_sink_persists_delivery_records() {
    let h = Harness::new().await;
    let sink = StoreHistorySink::new(h.core.clone());
    sink.record(&NotificationRecord {
        id: "n-1".to_string(),
        alert_id: "a-1".to_string(),
        channel_id: "ch-1".to_string(),
        channel_type: ChannelType::Email,
        recipient: "ops@example.com".to_string(),
        status: DeliveryStatus::Failed,
        error: Some("SMTP error: connection refused".to_string()),
        response_meta: None,
        retry_count: 2,
        duration_ms: 310,
        created_at: Utc::now(),
    })
    .await
    .unwrap();

    let rows = h.core.notification_records_for_alert("a-1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, DeliveryStatus::Failed);
    assert_eq!(rows[0].recipient, "ops@example.com");
}

#[test]
fn validate_condition_config_covers_every_type() {
    assert!(validate_condition_config(
        ConditionType::Threshold,
        &serde_json::json!({"operator": ">", "threshold": 1.0})
    )
    .is_ok());
    assert!(validate_condition_config(
        ConditionType::Change,
        &serde_json::json!({"comparison_period": "day", "change_type": "percent", "threshold": 20.0})
    )
    .is_ok());
    assert!(validate_condition_config(
        ConditionType::Anomaly,
        &serde_json::json!({"sensitivity": 3.0})
    )
    .is_ok());
    assert!(validate_condition_config(
        ConditionType::Pattern,
        &serde_json::json!({"pattern": "spike"})
    )
    .is_ok());

    let err = validate_condition_config(ConditionType::Anomaly, &serde_json::json!({}))
        .err()
        .unwrap();
    assert!(matches!(err, ConfigError::Malformed(_)));
}
