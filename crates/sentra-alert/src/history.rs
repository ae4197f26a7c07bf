use async_trait::async_trait;
use sentra_common::types::NotificationRecord;
use sentra_notify::dispatcher::HistorySink;
use sentra_notify::error::NotifyError;
use sentra_storage::store::CoreStore;
use std::sync::Arc;

/// Adapts the core store's notification-record table to the dispatcher's
/// [`HistorySink`] seam, so every delivery attempt lands in the same
/// database as the alerts themselves.
pub struct StoreHistorySink {
    core: Arc<CoreStore>,
}

impl StoreHistorySink {
    pub fn new(core: Arc<CoreStore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl HistorySink for StoreHistorySink {
    async fn record(&self, record: &NotificationRecord) -> Result<(), NotifyError> {
        self.core
            .insert_notification_record(record)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::History(e.to_string()))
    }
}
