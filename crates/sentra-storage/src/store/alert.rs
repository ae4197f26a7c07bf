use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
    QuerySelect,
};
use sentra_common::types::Alert;

use crate::entities::alert::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::CoreStore;

fn to_domain(m: alert::Model) -> Result<Alert> {
    Ok(Alert {
        severity: m.severity.parse().map_err(|e| StorageError::Decode {
            column: "severity",
            message: e,
        })?,
        context: serde_json::from_str(&m.context_json)?,
        id: m.id,
        rule_id: m.rule_id,
        workspace_id: m.workspace_id,
        title: m.title,
        message: m.message,
        metric_value: m.metric_value,
        threshold_value: m.threshold_value,
        triggered_at: m.triggered_at.with_timezone(&Utc),
        acknowledged_at: m.acknowledged_at.map(|t| t.with_timezone(&Utc)),
        acknowledged_by: m.acknowledged_by,
        resolved_at: m.resolved_at.map(|t| t.with_timezone(&Utc)),
        resolved_by: m.resolved_by,
        resolution_notes: m.resolution_notes,
        escalated: m.escalated,
        escalation_level: m.escalation_level,
        notification_sent: m.notification_sent,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

async fn fetch(store: &CoreStore, id: &str) -> Result<alert::Model> {
    Entity::find_by_id(id)
        .one(store.db())
        .await?
        .ok_or_else(|| StorageError::NotFound {
            entity: "alert",
            id: id.to_string(),
        })
}

impl CoreStore {
    pub async fn insert_alert(&self, a: &Alert) -> Result<Alert> {
        let now = Utc::now().fixed_offset();
        let am = alert::ActiveModel {
            id: Set(a.id.clone()),
            rule_id: Set(a.rule_id.clone()),
            workspace_id: Set(a.workspace_id.clone()),
            title: Set(a.title.clone()),
            message: Set(a.message.clone()),
            severity: Set(a.severity.to_string()),
            metric_value: Set(a.metric_value),
            threshold_value: Set(a.threshold_value),
            triggered_at: Set(a.triggered_at.fixed_offset()),
            acknowledged_at: Set(None),
            acknowledged_by: Set(None),
            resolved_at: Set(None),
            resolved_by: Set(None),
            resolution_notes: Set(None),
            escalated: Set(a.escalated),
            escalation_level: Set(a.escalation_level),
            notification_sent: Set(a.notification_sent),
            context_json: Set(serde_json::to_string(&a.context)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    /// Unresolved alerts for one workspace, newest first.
    pub async fn list_open_alerts(
        &self,
        workspace_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::ResolvedAt.is_null())
            .order_by(Column::TriggeredAt, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    /// Alerts fired by one rule, newest first.
    pub async fn list_alerts_for_rule(&self, rule_id: &str) -> Result<Vec<Alert>> {
        let rows = Entity::find()
            .filter(Column::RuleId.eq(rule_id))
            .order_by(Column::TriggeredAt, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn acknowledge_alert(
        &self,
        id: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<Alert> {
        let m = fetch(self, id).await?;
        let mut am: alert::ActiveModel = m.into();
        am.acknowledged_at = Set(Some(at.fixed_offset()));
        am.acknowledged_by = Set(Some(actor.to_string()));
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        to_domain(updated)
    }

    pub async fn resolve_alert(
        &self,
        id: &str,
        actor: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Alert> {
        let m = fetch(self, id).await?;
        let mut am: alert::ActiveModel = m.into();
        am.resolved_at = Set(Some(at.fixed_offset()));
        am.resolved_by = Set(Some(actor.to_string()));
        am.resolution_notes = Set(notes.map(|s| s.to_string()));
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        to_domain(updated)
    }

    pub async fn mark_alert_notified(&self, id: &str) -> Result<()> {
        let m = fetch(self, id).await?;
        let mut am: alert::ActiveModel = m.into();
        am.notification_sent = Set(true);
        am.updated_at = Set(Utc::now().fixed_offset());
        am.update(self.db()).await?;
        Ok(())
    }

    /// Advances the escalation state. Levels only ever move upward.
    pub async fn set_alert_escalation(&self, id: &str, level: i32) -> Result<Alert> {
        let m = fetch(self, id).await?;
        let mut am: alert::ActiveModel = m.into();
        am.escalated = Set(true);
        am.escalation_level = Set(level);
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        to_domain(updated)
    }
}
