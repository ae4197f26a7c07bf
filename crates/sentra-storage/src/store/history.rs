use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use sentra_common::types::NotificationRecord;

use crate::entities::notification_record::{self, Column, Entity};
use crate::error::{Result, StorageError};
use crate::store::CoreStore;

fn to_domain(m: notification_record::Model) -> Result<NotificationRecord> {
    Ok(NotificationRecord {
        channel_type: m.channel_type.parse().map_err(|e| StorageError::Decode {
            column: "channel_type",
            message: e,
        })?,
        status: m.status.parse().map_err(|e| StorageError::Decode {
            column: "status",
            message: e,
        })?,
        id: m.id,
        alert_id: m.alert_id,
        channel_id: m.channel_id,
        recipient: m.recipient,
        error: m.error,
        response_meta: m.response_meta,
        retry_count: m.retry_count,
        duration_ms: m.duration_ms,
        created_at: m.created_at.with_timezone(&Utc),
    })
}

impl CoreStore {
    /// Appends one delivery attempt. The table is append-only; there are no
    /// update or delete operations.
    pub async fn insert_notification_record(
        &self,
        r: &NotificationRecord,
    ) -> Result<NotificationRecord> {
        let am = notification_record::ActiveModel {
            id: Set(r.id.clone()),
            alert_id: Set(r.alert_id.clone()),
            channel_id: Set(r.channel_id.clone()),
            channel_type: Set(r.channel_type.to_string()),
            recipient: Set(r.recipient.clone()),
            status: Set(r.status.to_string()),
            error: Set(r.error.clone()),
            response_meta: Set(r.response_meta.clone()),
            retry_count: Set(r.retry_count),
            duration_ms: Set(r.duration_ms),
            created_at: Set(Utc::now().fixed_offset()),
        };
        let model = am.insert(self.db()).await?;
        to_domain(model)
    }

    /// Delivery history for one alert, in attempt order.
    pub async fn notification_records_for_alert(
        &self,
        alert_id: &str,
    ) -> Result<Vec<NotificationRecord>> {
        let rows = Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .order_by(Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    pub async fn count_notification_records(&self, alert_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::AlertId.eq(alert_id))
            .count(self.db())
            .await?)
    }
}
