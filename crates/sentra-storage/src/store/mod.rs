use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use crate::error::Result;

pub mod alert;
pub mod channel;
pub mod escalation;
pub mod history;
pub mod rule;
pub mod suppression;

/// Unified access layer for the management database: rules, alerts,
/// suppressions, escalation policies, notification channels, and
/// notification history.
///
/// All methods are `async fn` over SeaORM. The time-series metric store is
/// managed separately by [`crate::metrics::SqliteMetricStore`].
pub struct CoreStore {
    db: DatabaseConnection,
}

impl CoreStore {
    /// Connects to the management database and runs pending migrations.
    ///
    /// `db_url` is a full connection URL, e.g.
    /// `sqlite:///data/sentra.db?mode=rwc` or `sqlite::memory:` in tests.
    pub async fn connect(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL mode only applies to SQLite
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized core store");

        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
