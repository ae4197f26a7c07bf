use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use sentra_common::types::EscalationPolicy;

use crate::entities::escalation_policy::{self, Column, Entity};
use crate::error::Result;
use crate::store::CoreStore;

fn to_domain(m: escalation_policy::Model) -> Result<EscalationPolicy> {
    Ok(EscalationPolicy {
        levels: serde_json::from_str(&m.levels_json)?,
        id: m.id,
        workspace_id: m.workspace_id,
        name: m.name,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

impl CoreStore {
    pub async fn insert_escalation_policy(&self, p: &EscalationPolicy) -> Result<EscalationPolicy> {
        let now = Utc::now().fixed_offset();
        let am = escalation_policy::ActiveModel {
            id: Set(p.id.clone()),
            workspace_id: Set(p.workspace_id.clone()),
            name: Set(p.name.clone()),
            levels_json: Set(serde_json::to_string(&p.levels)?),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    pub async fn get_escalation_policy(&self, id: &str) -> Result<Option<EscalationPolicy>> {
        let model = Entity::find_by_id(id).one(self.db()).await?;
        model.map(to_domain).transpose()
    }

    pub async fn list_escalation_policies(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<EscalationPolicy>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn delete_escalation_policy(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
