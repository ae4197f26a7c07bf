use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use sentra_common::types::Rule;

use crate::entities::rule::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::CoreStore;

fn to_domain(m: rule::Model) -> Result<Rule> {
    Ok(Rule {
        condition_type: m.condition_type.parse().map_err(|e| StorageError::Decode {
            column: "condition_type",
            message: e,
        })?,
        severity: m.severity.parse().map_err(|e| StorageError::Decode {
            column: "severity",
            message: e,
        })?,
        config: serde_json::from_str(&m.config_json)?,
        channel_ids: serde_json::from_str(&m.channel_ids_json)?,
        id: m.id,
        workspace_id: m.workspace_id,
        name: m.name,
        metric_type: m.metric_type,
        check_interval_minutes: m.check_interval_minutes,
        cooldown_minutes: m.cooldown_minutes,
        escalation_policy_id: m.escalation_policy_id,
        enabled: m.enabled,
        last_evaluated_at: m.last_evaluated_at.map(|t| t.with_timezone(&Utc)),
        last_triggered_at: m.last_triggered_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl CoreStore {
    pub async fn insert_rule(&self, r: &Rule) -> Result<Rule> {
        let now = Utc::now().fixed_offset();
        let am = rule::ActiveModel {
            id: Set(r.id.clone()),
            workspace_id: Set(r.workspace_id.clone()),
            name: Set(r.name.clone()),
            metric_type: Set(r.metric_type.clone()),
            condition_type: Set(r.condition_type.to_string()),
            config_json: Set(serde_json::to_string(&r.config)?),
            check_interval_minutes: Set(r.check_interval_minutes),
            cooldown_minutes: Set(r.cooldown_minutes),
            severity: Set(r.severity.to_string()),
            channel_ids_json: Set(serde_json::to_string(&r.channel_ids)?),
            escalation_policy_id: Set(r.escalation_policy_id.clone()),
            enabled: Set(r.enabled),
            last_evaluated_at: Set(r.last_evaluated_at.map(|t| t.fixed_offset())),
            last_triggered_at: Set(r.last_triggered_at.map(|t| t.fixed_offset())),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<Rule>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    /// Enabled rules for one workspace, oldest first so long-standing rules
    /// are evaluated before recently added ones.
    pub async fn list_enabled_rules(&self, workspace_id: &str) -> Result<Vec<Rule>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::Enabled.eq(true))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn list_rules(&self, workspace_id: &str) -> Result<Vec<Rule>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn update_rule(&self, r: &Rule) -> Result<Rule> {
        let model = Entity::find_by_id(&r.id).one(self.db()).await?;
        let Some(m) = model else {
            return Err(StorageError::NotFound {
                entity: "rule",
                id: r.id.clone(),
            });
        };
        let mut am: rule::ActiveModel = m.into();
        am.name = Set(r.name.clone());
        am.metric_type = Set(r.metric_type.clone());
        am.condition_type = Set(r.condition_type.to_string());
        am.config_json = Set(serde_json::to_string(&r.config)?);
        am.check_interval_minutes = Set(r.check_interval_minutes);
        am.cooldown_minutes = Set(r.cooldown_minutes);
        am.severity = Set(r.severity.to_string());
        am.channel_ids_json = Set(serde_json::to_string(&r.channel_ids)?);
        am.escalation_policy_id = Set(r.escalation_policy_id.clone());
        am.enabled = Set(r.enabled);
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am.update(self.db()).await?;
        to_domain(updated)
    }

    /// Stamps `last_evaluated_at`. Called on every evaluation attempt,
    /// whatever the outcome, so a rule cannot hot-loop.
    pub async fn touch_rule_evaluated(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Err(StorageError::NotFound {
                entity: "rule",
                id: id.to_string(),
            });
        };
        let mut am: rule::ActiveModel = m.into();
        am.last_evaluated_at = Set(Some(at.fixed_offset()));
        am.update(self.db()).await?;
        Ok(())
    }

    /// Stamps `last_triggered_at`, arming the durable cooldown.
    pub async fn touch_rule_triggered(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        let Some(m) = model else {
            return Err(StorageError::NotFound {
                entity: "rule",
                id: id.to_string(),
            });
        };
        let mut am: rule::ActiveModel = m.into();
        am.last_triggered_at = Set(Some(at.fixed_offset()));
        am.update(self.db()).await?;
        Ok(())
    }

    pub async fn delete_rule(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
