//! Condition evaluation and alert orchestration.
//!
//! Rules are evaluated by pluggable [`ConditionEvaluator`] strategies, one
//! per [`ConditionType`] variant: threshold comparison, change against a
//! historical baseline, statistical anomaly, and qualitative pattern
//! detection. The [`engine::AlertEngine`] scans a workspace's rules,
//! applies cooldowns and suppression windows, creates alerts, fans out
//! notifications, and walks unacknowledged alerts up their escalation
//! policies.

pub mod conditions;
pub mod engine;
pub mod error;
pub mod history;
pub mod registry;
pub mod render;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use sentra_common::types::{ConditionType, MetricSample};
use sentra_storage::MetricStore;
use serde_json::{Map, Value};

use crate::error::{ConfigError, EvalError};

/// Result of one condition evaluation: whether the rule fired, plus a
/// structured context describing every number that went into the decision
/// so callers can render a message without re-deriving them.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub triggered: bool,
    pub context: Map<String, Value>,
}

/// A strategy that decides whether a rule's condition currently holds.
///
/// Implementations are registered in the [`registry::EvaluatorRegistry`]
/// under their [`ConditionType`]. `validate` is a pure function run at rule
/// create/update time; configs that fail it never reach `evaluate`.
pub trait ConditionEvaluator: Send + Sync {
    fn condition_type(&self) -> ConditionType;

    /// Validates a rule's condition config: required fields, enum
    /// membership, numeric ranges. Pure, off the evaluation hot path.
    fn validate(&self, config: &Value) -> Result<(), ConfigError>;

    /// Decides whether the condition holds against current and historical
    /// metric data. `current` carries a fresh sample when the caller
    /// already has one; otherwise the evaluator queries the store itself.
    ///
    /// # Errors
    ///
    /// Returns an error if metric data cannot be read. The engine treats
    /// that as non-triggering and moves on to the next rule.
    fn evaluate(
        &self,
        store: &dyn MetricStore,
        workspace_id: &str,
        metric_type: &str,
        config: &Value,
        current: Option<&MetricSample>,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvalError>;
}

/// Validates a condition config against the evaluator registered for the
/// given type. Exposed for rule create/update paths and config editors.
pub fn validate_condition_config(
    condition_type: ConditionType,
    config: &Value,
) -> Result<(), ConfigError> {
    registry::EvaluatorRegistry::default().validate(condition_type, config)
}
