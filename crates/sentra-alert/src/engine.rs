use chrono::{DateTime, Utc};
use sentra_common::id;
use sentra_common::types::{Alert, Rule, Suppression, SuppressionPattern};
use sentra_notify::dispatcher::{AlertDispatcher, DeliveryReport, NotificationDispatcher};
use sentra_notify::payload::AlertPayload;
use sentra_notify::plugin::ChannelRegistry;
use sentra_storage::store::CoreStore;
use sentra_storage::MetricStore;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::EngineError;
use crate::history::StoreHistorySink;
use crate::registry::EvaluatorRegistry;
use crate::render;

/// The alert orchestrator: scans a workspace's rules, applies cooldowns and
/// suppression windows, creates alerts, fans out notifications, and walks
/// unacknowledged alerts up their escalation policies.
///
/// An external scheduler drives the entry points; the engine owns no clock
/// loop. Cooldown state is durable (`rule.last_triggered_at`), so restarts
/// cannot re-fire rules early and multiple engine instances sharing the
/// store agree on quiet periods.
pub struct AlertEngine {
    core: Arc<CoreStore>,
    metrics: Arc<dyn MetricStore>,
    dispatcher: Arc<dyn AlertDispatcher>,
    evaluators: EvaluatorRegistry,
}

impl AlertEngine {
    pub fn new(
        core: Arc<CoreStore>,
        metrics: Arc<dyn MetricStore>,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self {
            core,
            metrics,
            dispatcher,
            evaluators: EvaluatorRegistry::default(),
        }
    }

    /// Engine wired to the built-in channel registry, with delivery history
    /// recorded through the same core store as the alerts.
    pub fn with_default_dispatcher(core: Arc<CoreStore>, metrics: Arc<dyn MetricStore>) -> Self {
        let history = Arc::new(StoreHistorySink::new(core.clone()));
        let dispatcher = NotificationDispatcher::new(ChannelRegistry::default(), history);
        Self::new(core, metrics, Arc::new(dispatcher))
    }

    /// Validates the condition config, then persists the rule. A config the
    /// matching evaluator rejects never reaches evaluation.
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule, EngineError> {
        self.evaluators.validate(rule.condition_type, &rule.config)?;
        Ok(self.core.insert_rule(&rule).await?)
    }

    pub async fn update_rule(&self, rule: Rule) -> Result<Rule, EngineError> {
        self.evaluators.validate(rule.condition_type, &rule.config)?;
        Ok(self.core.update_rule(&rule).await?)
    }

    /// Evaluates every enabled rule in the workspace, sequentially, and
    /// returns the alerts created in this pass.
    ///
    /// Failing to load the rule list is terminal for the call; a failure
    /// while evaluating one rule is logged and the batch continues.
    pub async fn evaluate_rules(&self, workspace_id: &str) -> Result<Vec<Alert>, EngineError> {
        let rules = self.core.list_enabled_rules(workspace_id).await?;
        let now = Utc::now();
        tracing::debug!(
            workspace_id,
            rule_count = rules.len(),
            "Starting rule evaluation pass"
        );

        let mut created = Vec::new();
        for rule in rules {
            match self.evaluate_rule(&rule, now).await {
                Ok(Some(alert)) => created.push(alert),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        rule_id = %rule.id,
                        error = %e,
                        "Rule evaluation failed, continuing with next rule"
                    );
                }
            }
        }
        Ok(created)
    }

    async fn evaluate_rule(
        &self,
        rule: &Rule,
        now: DateTime<Utc>,
    ) -> Result<Option<Alert>, EngineError> {
        if rule.in_cooldown(now) {
            tracing::debug!(rule_id = %rule.id, "Rule in cooldown, skipping");
            return Ok(None);
        }
        if !rule.is_due(now) {
            tracing::debug!(rule_id = %rule.id, "Rule not yet due, skipping");
            return Ok(None);
        }

        let evaluation = match self.evaluators.get(rule.condition_type) {
            Some(evaluator) => evaluator.evaluate(
                self.metrics.as_ref(),
                &rule.workspace_id,
                &rule.metric_type,
                &rule.config,
                None,
                now,
            ),
            None => {
                // Unreachable with the default registry; a custom registry
                // missing a variant still must not abort the batch.
                tracing::error!(
                    rule_id = %rule.id,
                    condition_type = %rule.condition_type,
                    "No evaluator registered, skipping rule"
                );
                self.core.touch_rule_evaluated(&rule.id, now).await?;
                return Ok(None);
            }
        };

        // Stamped on every attempt, whatever the outcome, so a broken rule
        // cannot hot-loop between scheduler ticks.
        self.core.touch_rule_evaluated(&rule.id, now).await?;

        let evaluation = match evaluation {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!(
                    rule_id = %rule.id,
                    error = %e,
                    "Condition evaluation failed, treating as non-triggered"
                );
                return Ok(None);
            }
        };

        if !evaluation.triggered {
            return Ok(None);
        }

        let suppressions = self
            .core
            .active_suppressions(&rule.workspace_id, now)
            .await?;
        if let Some(suppression) = suppressions.iter().find(|s| s.pattern.matches(rule)) {
            tracing::info!(
                rule_id = %rule.id,
                suppression_id = %suppression.id,
                pattern_kind = suppression.pattern.kind(),
                "Alert suppressed (active suppression window)"
            );
            return Ok(None);
        }

        let mut alert = self.build_alert(rule, &evaluation.context, now);
        alert = self.core.insert_alert(&alert).await?;
        tracing::info!(
            rule_id = %rule.id,
            alert_id = %alert.id,
            severity = %alert.severity,
            "Alert created"
        );

        let report = self
            .dispatch(&AlertPayload::from_alert(&alert), &rule.channel_ids)
            .await?;
        if report.successful > 0 {
            self.core.mark_alert_notified(&alert.id).await?;
            alert.notification_sent = true;
        }

        self.core.touch_rule_triggered(&rule.id, now).await?;
        Ok(Some(alert))
    }

    fn build_alert(&self, rule: &Rule, context: &Map<String, Value>, now: DateTime<Utc>) -> Alert {
        Alert {
            id: id::next_id(),
            rule_id: rule.id.clone(),
            workspace_id: rule.workspace_id.clone(),
            title: render::render_title(rule),
            message: render::render_message(rule, context),
            severity: rule.severity,
            metric_value: context_f64(context, &["current_value", "latest"]),
            threshold_value: context_f64(context, &["threshold", "mean", "baseline", "rest_mean"]),
            triggered_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            escalated: false,
            escalation_level: 0,
            notification_sent: false,
            context: Value::Object(context.clone()),
            created_at: now,
            updated_at: now,
        }
    }

    async fn dispatch(
        &self,
        payload: &AlertPayload,
        channel_ids: &[String],
    ) -> Result<DeliveryReport, EngineError> {
        let channels = self.core.channels_by_ids(channel_ids).await?;
        if channels.is_empty() {
            tracing::debug!(alert_id = %payload.alert_id, "No channels configured, skipping dispatch");
            return Ok(DeliveryReport::default());
        }
        Ok(self.dispatcher.dispatch(payload, &channels).await)
    }

    /// Advances an unacknowledged, unresolved alert at most one escalation
    /// level, if its policy has a level whose delay has elapsed. The
    /// scheduler calls this repeatedly; levels are never skipped.
    pub async fn check_escalation(&self, alert_id: &str) -> Result<bool, EngineError> {
        let alert =
            self.core
                .get_alert(alert_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "alert",
                    id: alert_id.to_string(),
                })?;

        if alert.is_acknowledged() || alert.is_resolved() {
            tracing::debug!(alert_id, "Alert acknowledged or resolved, no escalation");
            return Ok(false);
        }

        let Some(rule) = self.core.get_rule(&alert.rule_id).await? else {
            tracing::warn!(alert_id, rule_id = %alert.rule_id, "Rule for alert no longer exists");
            return Ok(false);
        };
        let Some(policy_id) = rule.escalation_policy_id else {
            return Ok(false);
        };
        let Some(policy) = self.core.get_escalation_policy(&policy_id).await? else {
            tracing::warn!(alert_id, policy_id = %policy_id, "Escalation policy no longer exists");
            return Ok(false);
        };

        let elapsed = Utc::now() - alert.triggered_at;
        let Some(level) = policy.next_eligible(alert.escalation_level, elapsed) else {
            return Ok(false);
        };

        let payload = AlertPayload::escalated(&alert, level.level);
        self.dispatch(&payload, &level.channel_ids).await?;
        self.core.set_alert_escalation(&alert.id, level.level).await?;
        tracing::info!(
            alert_id,
            level = level.level,
            elapsed_minutes = elapsed.num_minutes(),
            "Alert escalated"
        );
        Ok(true)
    }

    /// Acknowledges an alert. Idempotent: repeating the call, or
    /// acknowledging an already-resolved alert, is a no-op success.
    pub async fn acknowledge(&self, alert_id: &str, actor: &str) -> Result<Alert, EngineError> {
        let alert =
            self.core
                .get_alert(alert_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "alert",
                    id: alert_id.to_string(),
                })?;
        if alert.is_acknowledged() || alert.is_resolved() {
            tracing::debug!(alert_id, "Alert already acknowledged or resolved");
            return Ok(alert);
        }
        let acked = self
            .core
            .acknowledge_alert(alert_id, actor, Utc::now())
            .await?;
        tracing::info!(alert_id, actor, "Alert acknowledged");
        Ok(acked)
    }

    /// Resolves an alert. Idempotent; resolution is terminal.
    pub async fn resolve(
        &self,
        alert_id: &str,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<Alert, EngineError> {
        let alert =
            self.core
                .get_alert(alert_id)
                .await?
                .ok_or_else(|| EngineError::NotFound {
                    entity: "alert",
                    id: alert_id.to_string(),
                })?;
        if alert.is_resolved() {
            tracing::debug!(alert_id, "Alert already resolved");
            return Ok(alert);
        }
        let resolved = self
            .core
            .resolve_alert(alert_id, actor, notes, Utc::now())
            .await?;
        tracing::info!(alert_id, actor, "Alert resolved");
        Ok(resolved)
    }

    /// Installs a suppression window covering `[now, now + duration)` for
    /// rules the pattern matches. Used interactively to silence a known
    /// noisy rule without touching its definition.
    pub async fn apply_suppression(
        &self,
        pattern: SuppressionPattern,
        workspace_id: &str,
        duration_minutes: i64,
        reason: Option<&str>,
    ) -> Result<Suppression, EngineError> {
        let now = Utc::now();
        let suppression = Suppression {
            id: id::next_id(),
            workspace_id: workspace_id.to_string(),
            pattern,
            starts_at: now,
            ends_at: now + chrono::Duration::minutes(duration_minutes),
            reason: reason.map(|s| s.to_string()),
            created_at: now,
        };
        let installed = self.core.insert_suppression(&suppression).await?;
        tracing::info!(
            workspace_id,
            suppression_id = %installed.id,
            pattern_kind = installed.pattern.kind(),
            duration_minutes,
            "Suppression window installed"
        );
        Ok(installed)
    }
}

fn context_f64(context: &Map<String, Value>, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|k| context.get(*k).and_then(Value::as_f64))
        .unwrap_or(0.0)
}
