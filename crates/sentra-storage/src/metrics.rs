use crate::error::Result;
use crate::{MetricQuery, MetricStore};
use chrono::DateTime;
use rusqlite::Connection;
use sentra_common::types::MetricSample;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed time-series store for metric samples.
///
/// A single WAL-mode database holds one `metrics` table indexed by
/// (workspace, metric type, timestamp). Writes come from whatever ingestion
/// path feeds the system; the alert engine only reads through the
/// [`MetricStore`] trait.
pub struct SqliteMetricStore {
    conn: Mutex<Connection>,
}

impl SqliteMetricStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        tracing::info!(path = %path.display(), "Opened metric store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS metrics (
                 timestamp INTEGER NOT NULL,
                 workspace_id TEXT NOT NULL,
                 metric_type TEXT NOT NULL,
                 value REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_metrics_lookup
                 ON metrics(workspace_id, metric_type, timestamp);",
        )?;
        Ok(())
    }

    pub fn record(&self, sample: &MetricSample) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO metrics (timestamp, workspace_id, metric_type, value)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(rusqlite::params![
            sample.timestamp.timestamp_millis(),
            &sample.workspace_id,
            &sample.metric_type,
            sample.value,
        ])?;
        Ok(())
    }

    pub fn record_batch(&self, samples: &[MetricSample]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO metrics (timestamp, workspace_id, metric_type, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for sample in samples {
                stmt.execute(rusqlite::params![
                    sample.timestamp.timestamp_millis(),
                    &sample.workspace_id,
                    &sample.metric_type,
                    sample.value,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Removes samples older than `retention_days`. Returns rows deleted.
    pub fn cleanup(&self, retention_days: u32) -> Result<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(retention_days));
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM metrics WHERE timestamp < ?1",
            rusqlite::params![cutoff.timestamp_millis()],
        )?;
        Ok(deleted)
    }
}

impl MetricStore for SqliteMetricStore {
    fn latest(&self, workspace_id: &str, metric_type: &str) -> Result<Option<MetricSample>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, value FROM metrics
             WHERE workspace_id = ?1 AND metric_type = ?2
             ORDER BY timestamp DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(rusqlite::params![workspace_id, metric_type])?;
        match rows.next()? {
            Some(row) => {
                let ts_ms: i64 = row.get(0)?;
                let value: f64 = row.get(1)?;
                Ok(Some(MetricSample {
                    timestamp: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
                    workspace_id: workspace_id.to_string(),
                    metric_type: metric_type.to_string(),
                    value,
                }))
            }
            None => Ok(None),
        }
    }

    fn range(&self, query: &MetricQuery) -> Result<Vec<MetricSample>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, value FROM metrics
             WHERE workspace_id = ?1 AND metric_type = ?2
               AND timestamp >= ?3 AND timestamp <= ?4
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![
                &query.workspace_id,
                &query.metric_type,
                query.from.timestamp_millis(),
                query.to.timestamp_millis(),
            ],
            |row| {
                let ts_ms: i64 = row.get(0)?;
                let value: f64 = row.get(1)?;
                Ok((ts_ms, value))
            },
        )?;

        let mut results = Vec::new();
        for row in rows {
            let (ts_ms, value) = row?;
            results.push(MetricSample {
                timestamp: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
                workspace_id: query.workspace_id.clone(),
                metric_type: query.metric_type.clone(),
                value,
            });
        }
        Ok(results)
    }
}
