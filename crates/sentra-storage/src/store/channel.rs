use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use sentra_common::types::ChannelConfig;

use crate::entities::notification_channel::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::CoreStore;

fn to_domain(m: notification_channel::Model) -> Result<ChannelConfig> {
    Ok(ChannelConfig {
        channel_type: m.channel_type.parse().map_err(|e| StorageError::Decode {
            column: "channel_type",
            message: e,
        })?,
        min_severity: m.min_severity.parse().map_err(|e| StorageError::Decode {
            column: "min_severity",
            message: e,
        })?,
        config: serde_json::from_str(&m.config_json)?,
        recipients: serde_json::from_str(&m.recipients_json)?,
        id: m.id,
        workspace_id: m.workspace_id,
        name: m.name,
        enabled: m.enabled,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl CoreStore {
    pub async fn insert_channel(&self, c: &ChannelConfig) -> Result<ChannelConfig> {
        let now = Utc::now().fixed_offset();
        let am = notification_channel::ActiveModel {
            id: Set(c.id.clone()),
            workspace_id: Set(c.workspace_id.clone()),
            name: Set(c.name.clone()),
            channel_type: Set(c.channel_type.to_string()),
            min_severity: Set(c.min_severity.to_string()),
            enabled: Set(c.enabled),
            config_json: Set(serde_json::to_string(&c.config)?),
            recipients_json: Set(serde_json::to_string(&c.recipients)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    pub async fn get_channel(&self, id: &str) -> Result<Option<ChannelConfig>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    /// Loads the channel rows a rule or escalation level points at. Unknown
    /// IDs are skipped rather than failing the lookup; a dangling reference
    /// must not take down an evaluation pass.
    pub async fn channels_by_ids(&self, ids: &[String]) -> Result<Vec<ChannelConfig>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = Entity::find()
            .filter(Column::Id.is_in(ids.iter().cloned()))
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn list_channels(&self, workspace_id: &str) -> Result<Vec<ChannelConfig>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn delete_channel(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
