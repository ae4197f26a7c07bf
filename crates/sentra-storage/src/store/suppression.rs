use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder,
};
use sentra_common::types::{Suppression, SuppressionPattern};

use crate::entities::suppression::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::CoreStore;

fn to_domain(m: suppression::Model) -> Result<Suppression> {
    Ok(Suppression {
        pattern: SuppressionPattern::from_parts(&m.pattern_kind, &m.pattern_value).map_err(
            |e| StorageError::Decode {
                column: "pattern_kind",
                message: e,
            },
        )?,
        id: m.id,
        workspace_id: m.workspace_id,
        starts_at: m.starts_at.with_timezone(&Utc),
        ends_at: m.ends_at.with_timezone(&Utc),
        reason: m.reason,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

impl CoreStore {
    pub async fn insert_suppression(&self, s: &Suppression) -> Result<Suppression> {
        let am = suppression::ActiveModel {
            id: Set(s.id.clone()),
            workspace_id: Set(s.workspace_id.clone()),
            pattern_kind: Set(s.pattern.kind().to_string()),
            pattern_value: Set(s.pattern.value_string()),
            starts_at: Set(s.starts_at.fixed_offset()),
            ends_at: Set(s.ends_at.fixed_offset()),
            reason: Set(s.reason.clone()),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    /// Suppression windows active at `now` for one workspace. The window
    /// bounds are re-checked in Rust after the coarse `ends_at` filter, so
    /// text-encoded timestamp comparisons never decide the outcome alone.
    pub async fn active_suppressions(
        &self,
        workspace_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Suppression>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .filter(Column::EndsAt.gt(now.fixed_offset()))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        let mut active = Vec::new();
        for row in rows {
            let s = to_domain(row)?;
            if s.is_active(now) {
                active.push(s);
            }
        }
        Ok(active)
    }

    pub async fn list_suppressions(&self, workspace_id: &str) -> Result<Vec<Suppression>> {
        let rows = Entity::find()
            .filter(Column::WorkspaceId.eq(workspace_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn delete_suppression(&self, id: &str) -> Result<bool> {
        let res = Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }
}
