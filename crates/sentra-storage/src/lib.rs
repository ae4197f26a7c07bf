//! Persistence layer for rules, alerts, and notification history, plus the
//! time-series metric store the condition evaluators read from.
//!
//! Management records (rules, alerts, suppressions, escalation policies,
//! notification channels and history) live in a SeaORM-backed
//! [`store::CoreStore`]; raw metric samples live in a separate
//! rusqlite-backed [`metrics::SqliteMetricStore`] behind the [`MetricStore`]
//! trait so the engine only ever depends on the query contract.

pub mod entities;
pub mod error;
pub mod metrics;
pub mod store;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use sentra_common::types::MetricSample;

use crate::error::Result;

/// Parameters for a time-range metric query, scoped to a single workspace
/// and metric type.
///
/// # Examples
///
/// ```
/// use sentra_storage::MetricQuery;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let query = MetricQuery {
///     workspace_id: "ws-prod".into(),
///     metric_type: "cpu.usage".into(),
///     from: now - Duration::hours(1),
///     to: now,
/// };
/// assert_eq!(query.metric_type, "cpu.usage");
/// ```
pub struct MetricQuery {
    pub workspace_id: String,
    pub metric_type: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Read contract the condition evaluators depend on: the current value of a
/// metric and N historical samples over a window. Implementations must be
/// shareable across threads (`Send + Sync`); the engine holds one behind an
/// `Arc`.
pub trait MetricStore: Send + Sync {
    /// The most recent sample for the given workspace and metric type.
    fn latest(&self, workspace_id: &str, metric_type: &str) -> Result<Option<MetricSample>>;

    /// Samples matching the query, ordered by ascending timestamp.
    fn range(&self, query: &MetricQuery) -> Result<Vec<MetricSample>>;
}
