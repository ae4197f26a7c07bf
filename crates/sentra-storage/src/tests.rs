use crate::metrics::SqliteMetricStore;
use crate::store::CoreStore;
use crate::{MetricQuery, MetricStore};
use chrono::{Duration, Utc};
use sentra_common::types::{
    Alert, ChannelConfig, ChannelType, ConditionType, DeliveryStatus, EscalationLevel,
    EscalationPolicy, MetricSample, NotificationRecord, Rule, Severity, Suppression,
    SuppressionPattern,
};

async fn memory_store() -> CoreStore {
    CoreStore::connect("sqlite::memory:")
        .await
        .expect("in-memory store should initialize")
}

fn make_rule(id: &str) -> Rule {
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
        severity: Severity::Warning,
        channel_ids: vec!["ch-1".to_string()],
        escalation_policy_id: None,
        enabled: true,
        last_evaluated_at: None,
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn make_alert(id: &str, rule_id: &str) -> Alert {
    let now = Utc::now();
    Alert {
        id: id.to_string(),
        rule_id: rule_id.to_string(),
        workspace_id: "ws-1".to_string(),
        title: "High CPU".to_string(),
        message: "cpu.usage is above 90.0".to_string(),
        severity: Severity::Warning,
        metric_value: 95.0,
        threshold_value: 90.0,
        triggered_at: now,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        resolution_notes: None,
        escalated: false,
        escalation_level: 0,
        notification_sent: false,
        context: serde_json::json!({"current_value": 95.0}),
        created_at: now,
        updated_at: now,
    }
}

fn make_sample(metric: &str, value: f64, secs_ago: i64) -> MetricSample {
    MetricSample {
        timestamp: Utc::now() - Duration::seconds(secs_ago),
        workspace_id: "ws-1".to_string(),
        metric_type: metric.to_string(),
        value,
    }
}

#[test]
fn metric_store_latest_and_range() {
    let store = SqliteMetricStore::open_in_memory().unwrap();
    store
        .record_batch(&[
            make_sample("cpu.usage", 40.0, 120),
            make_sample("cpu.usage", 60.0, 60),
            make_sample("cpu.usage", 80.0, 0),
            make_sample("memory.used", 10.0, 0),
        ])
        .unwrap();

    let latest = store.latest("ws-1", "cpu.usage").unwrap().unwrap();
    assert_eq!(latest.value, 80.0);

    assert!(store.latest("ws-1", "disk.used").unwrap().is_none());
    assert!(store.latest("ws-2", "cpu.usage").unwrap().is_none());

    let now = Utc::now();
    let range = store
        .range(&MetricQuery {
            workspace_id: "ws-1".into(),
            metric_type: "cpu.usage".into(),
            from: now - Duration::seconds(90),
            to: now,
        })
        .unwrap();
    assert_eq!(range.len(), 2);
    assert!(range[0].timestamp <= range[1].timestamp);
    assert_eq!(range[1].value, 80.0);
}

#[test]
fn metric_store_cleanup_removes_old_samples() {
    let store = SqliteMetricStore::open_in_memory().unwrap();
    store
        .record(&make_sample("cpu.usage", 50.0, 10 * 24 * 3600))
        .unwrap();
    store.record(&make_sample("cpu.usage", 60.0, 0)).unwrap();

    let deleted = store.cleanup(7).unwrap();
    assert_eq!(deleted, 1);
    let latest = store.latest("ws-1", "cpu.usage").unwrap().unwrap();
    assert_eq!(latest.value, 60.0);
}

#[tokio::test]
async fn rule_round_trip_and_touch() {
    let store = memory_store().await;
    let rule = store.insert_rule(&make_rule("r-1")).await.unwrap();
    assert_eq!(rule.condition_type, ConditionType::Threshold);
    assert!(rule.last_evaluated_at.is_none());

    let fetched = store.get_rule("r-1").await.unwrap().unwrap();
    assert_eq!(fetched.name, "High CPU");
    assert_eq!(fetched.channel_ids, vec!["ch-1".to_string()]);
    assert_eq!(fetched.config["threshold"], 90.0);

    let at = Utc::now();
    store.touch_rule_evaluated("r-1", at).await.unwrap();
    store.touch_rule_triggered("r-1", at).await.unwrap();
    let touched = store.get_rule("r-1").await.unwrap().unwrap();
    assert!(touched.last_evaluated_at.is_some());
    assert!(touched.in_cooldown(at));
}

#[tokio::test]
async fn list_enabled_rules_skips_disabled() {
    let store = memory_store().await;
    store.insert_rule(&make_rule("r-1")).await.unwrap();
    let mut disabled = make_rule("r-2");
    disabled.enabled = false;
    store.insert_rule(&disabled).await.unwrap();

    let mut other_ws = make_rule("r-3");
    other_ws.workspace_id = "ws-2".to_string();
    store.insert_rule(&other_ws).await.unwrap();

    let rules = store.list_enabled_rules("ws-1").await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, "r-1");
}

#[tokio::test]
async fn update_rule_persists_changes() {
    let store = memory_store().await;
    store.insert_rule(&make_rule("r-1")).await.unwrap();

    let mut rule = store.get_rule("r-1").await.unwrap().unwrap();
    rule.severity = Severity::Critical;
    rule.cooldown_minutes = 60;
    store.update_rule(&rule).await.unwrap();

    let updated = store.get_rule("r-1").await.unwrap().unwrap();
    assert_eq!(updated.severity, Severity::Critical);
    assert_eq!(updated.cooldown_minutes, 60);

    assert!(store.delete_rule("r-1").await.unwrap());
    assert!(store.get_rule("r-1").await.unwrap().is_none());
}

#[tokio::test]
async fn alert_lifecycle_updates() {
    let store = memory_store().await;
    store.insert_alert(&make_alert("a-1", "r-1")).await.unwrap();

    let open = store.list_open_alerts("ws-1", 10, 0).await.unwrap();
    assert_eq!(open.len(), 1);

    let acked = store
        .acknowledge_alert("a-1", "operator", Utc::now())
        .await
        .unwrap();
    assert!(acked.is_acknowledged());
    assert_eq!(acked.acknowledged_by.as_deref(), Some("operator"));

    store.mark_alert_notified("a-1").await.unwrap();
    let escalated = store.set_alert_escalation("a-1", 1).await.unwrap();
    assert!(escalated.escalated);
    assert_eq!(escalated.escalation_level, 1);
    assert!(escalated.notification_sent);

    let resolved = store
        .resolve_alert("a-1", "operator", Some("restarted service"), Utc::now())
        .await
        .unwrap();
    assert!(resolved.is_resolved());
    assert_eq!(
        resolved.resolution_notes.as_deref(),
        Some("restarted service")
    );

    let open = store.list_open_alerts("ws-1", 10, 0).await.unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn suppression_active_window_filter() {
    let store = memory_store().await;
    let now = Utc::now();

    let active = Suppression {
        id: "s-1".to_string(),
        workspace_id: "ws-1".to_string(),
        pattern: SuppressionPattern::MetricType("cpu.usage".to_string()),
        starts_at: now - Duration::minutes(5),
        ends_at: now + Duration::minutes(55),
        reason: Some("planned maintenance".to_string()),
        created_at: now,
    };
    let expired = Suppression {
        id: "s-2".to_string(),
        pattern: SuppressionPattern::Severity(Severity::Info),
        starts_at: now - Duration::hours(3),
        ends_at: now - Duration::hours(1),
        ..active.clone()
    };
    let future = Suppression {
        id: "s-3".to_string(),
        pattern: SuppressionPattern::RuleId("r-1".to_string()),
        starts_at: now + Duration::hours(1),
        ends_at: now + Duration::hours(2),
        ..active.clone()
    };
    store.insert_suppression(&active).await.unwrap();
    store.insert_suppression(&expired).await.unwrap();
    store.insert_suppression(&future).await.unwrap();

    let found = store.active_suppressions("ws-1", now).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "s-1");
    assert_eq!(
        found[0].pattern,
        SuppressionPattern::MetricType("cpu.usage".to_string())
    );

    assert_eq!(store.list_suppressions("ws-1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn escalation_policy_round_trip() {
    let store = memory_store().await;
    let now = Utc::now();
    let policy = EscalationPolicy {
        id: "p-1".to_string(),
        workspace_id: "ws-1".to_string(),
        name: "oncall ladder".to_string(),
        levels: vec![
            EscalationLevel {
                level: 1,
                delay_minutes: 10,
                channel_ids: vec!["ch-1".to_string()],
            },
            EscalationLevel {
                level: 2,
                delay_minutes: 30,
                channel_ids: vec!["ch-2".to_string()],
            },
        ],
        created_at: now,
        updated_at: now,
    };
    store.insert_escalation_policy(&policy).await.unwrap();

    let fetched = store.get_escalation_policy("p-1").await.unwrap().unwrap();
    assert_eq!(fetched.levels.len(), 2);
    assert_eq!(fetched.levels[1].delay_minutes, 30);
}

#[tokio::test]
async fn channel_lookup_by_ids_skips_unknown() {
    let store = memory_store().await;
    let now = Utc::now();
    let channel = ChannelConfig {
        id: "ch-1".to_string(),
        workspace_id: "ws-1".to_string(),
        name: "ops mail".to_string(),
        channel_type: ChannelType::Email,
        min_severity: Severity::Info,
        enabled: true,
        config: serde_json::json!({"smtp_host": "mail.example.com"}),
        recipients: vec!["ops@example.com".to_string()],
        created_at: now,
        updated_at: now,
    };
    store.insert_channel(&channel).await.unwrap();

    let found = store
        .channels_by_ids(&["ch-1".to_string(), "ch-missing".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].channel_type, ChannelType::Email);

    assert!(store.channels_by_ids(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn notification_history_is_append_only_per_target() {
    let store = memory_store().await;
    for (i, status) in [DeliveryStatus::Sent, DeliveryStatus::Failed]
        .into_iter()
        .enumerate()
    {
        let record = NotificationRecord {
            id: format!("n-{i}"),
            alert_id: "a-1".to_string(),
            channel_id: "ch-1".to_string(),
            channel_type: ChannelType::Webhook,
            recipient: format!("https://hooks.example.com/{i}"),
            status,
            error: match status {
                DeliveryStatus::Failed => Some("delivery timed out".to_string()),
                DeliveryStatus::Sent => None,
            },
            response_meta: None,
            retry_count: 2,
            duration_ms: 40,
            created_at: Utc::now(),
        };
        store.insert_notification_record(&record).await.unwrap();
    }

    let records = store.notification_records_for_alert("a-1").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, DeliveryStatus::Sent);
    assert_eq!(records[1].status, DeliveryStatus::Failed);
    assert_eq!(records[1].error.as_deref(), Some("delivery timed out"));
    assert_eq!(store.count_notification_records("a-1").await.unwrap(), 2);
}
