use chrono::{DateTime, Utc};
use sentra_common::types::{ConditionType, MetricSample};
use sentra_storage::MetricStore;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{ConfigError, EvalError};
use crate::{ConditionEvaluator, Evaluation};

/// Absolute tolerance for `==` / `!=` comparisons, so float noise in the
/// metric pipeline does not defeat equality rules.
pub const EQ_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" | "gt" | "greater_than" => Ok(Self::GreaterThan),
            "<" | "lt" | "less_than" => Ok(Self::LessThan),
            ">=" | "gte" | "greater_equal" => Ok(Self::GreaterEqual),
            "<=" | "lte" | "less_equal" => Ok(Self::LessEqual),
            "==" | "eq" | "equal" => Ok(Self::Equal),
            "!=" | "ne" | "not_equal" => Ok(Self::NotEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, ">"),
            Self::LessThan => write!(f, "<"),
            Self::GreaterEqual => write!(f, ">="),
            Self::LessEqual => write!(f, "<="),
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
        }
    }
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
            Self::Equal => (value - threshold).abs() <= EQ_TOLERANCE,
            Self::NotEqual => (value - threshold).abs() > EQ_TOLERANCE,
        }
    }

    pub fn word(&self) -> &'static str {
        match self {
            Self::GreaterThan => "above",
            Self::LessThan => "below",
            Self::GreaterEqual => "at or above",
            Self::LessEqual => "at or below",
            Self::Equal => "equal to",
            Self::NotEqual => "not equal to",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdConfig {
    operator: String,
    threshold: f64,
}

/// Compares the current metric value against a configured threshold.
pub struct ThresholdEvaluator;

impl ThresholdEvaluator {
    fn parse(config: &Value) -> Result<(CompareOp, f64), ConfigError> {
        let cfg: ThresholdConfig = serde_json::from_value(config.clone())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        let op = cfg
            .operator
            .parse::<CompareOp>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "operator",
                message: e,
            })?;
        if !cfg.threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "threshold",
                message: "must be a finite number".to_string(),
            });
        }
        Ok((op, cfg.threshold))
    }
}

impl ConditionEvaluator for ThresholdEvaluator {
    fn condition_type(&self) -> ConditionType {
        ConditionType::Threshold
    }

    fn validate(&self, config: &Value) -> Result<(), ConfigError> {
        Self::parse(config).map(|_| ())
    }

    fn evaluate(
        &self,
        store: &dyn MetricStore,
        workspace_id: &str,
        metric_type: &str,
        config: &Value,
        current: Option<&MetricSample>,
        _now: DateTime<Utc>,
    ) -> Result<Evaluation, EvalError> {
        let (op, threshold) = Self::parse(config)?;

        let current_value = match current {
            Some(sample) => Some(sample.value),
            None => store.latest(workspace_id, metric_type)?.map(|s| s.value),
        };

        let mut context = Map::new();
        context.insert("condition".into(), "threshold".into());
        context.insert("operator".into(), op.to_string().into());
        context.insert("operator_label".into(), op.word().into());
        context.insert("threshold".into(), threshold.into());

        let Some(value) = current_value else {
            context.insert("missing_current".into(), true.into());
            return Ok(Evaluation {
                triggered: false,
                context,
            });
        };
        context.insert("current_value".into(), value.into());

        Ok(Evaluation {
            triggered: op.check(value, threshold),
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_storage::metrics::SqliteMetricStore;

    fn eval_with_current(value: f64, op: &str, threshold: f64) -> Evaluation {
        let store = SqliteMetricStore::open_in_memory().unwrap();
        let sample = MetricSample {
            timestamp: Utc::now(),
            workspace_id: "ws-1".into(),
            metric_type: "cpu.usage".into(),
            value,
        };
        ThresholdEvaluator
            .evaluate(
                &store,
                "ws-1",
                "cpu.usage",
                &serde_json::json!({"operator": op, "threshold": threshold}),
                Some(&sample),
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn fires_above_threshold() {
        let result = eval_with_current(10.0, ">", 5.0);
        assert!(result.triggered);
        assert_eq!(result.context["current_value"], 10.0);
        assert_eq!(result.context["threshold"], 5.0);
    }

    #[test]
    fn does_not_fire_at_exact_threshold_for_strict_greater() {
        assert!(!eval_with_current(5.0, ">", 5.0).triggered);
    }

    #[test]
    fn equality_uses_tolerance() {
        assert!(eval_with_current(5.000_000_000_1, "==", 5.0).triggered);
        assert!(!eval_with_current(5.1, "==", 5.0).triggered);
        assert!(!eval_with_current(5.000_000_000_1, "!=", 5.0).triggered);
    }

    #[test]
    fn word_operator_aliases_parse() {
        assert!(eval_with_current(1.0, "less_than", 5.0).triggered);
        assert!(eval_with_current(5.0, "gte", 5.0).triggered);
    }

    #[test]
    fn queries_latest_when_no_current_sample() {
        let store = SqliteMetricStore::open_in_memory().unwrap();
        store
            .record(&MetricSample {
                timestamp: Utc::now(),
                workspace_id: "ws-1".into(),
                metric_type: "cpu.usage".into(),
                value: 92.0,
            })
            .unwrap();

        let result = ThresholdEvaluator
            .evaluate(
                &store,
                "ws-1",
                "cpu.usage",
                &serde_json::json!({"operator": ">", "threshold": 90.0}),
                None,
                Utc::now(),
            )
            .unwrap();
        assert!(result.triggered);
    }

    #[test]
    fn missing_metric_is_a_non_trigger() {
        let store = SqliteMetricStore::open_in_memory().unwrap();
        let result = ThresholdEvaluator
            .evaluate(
                &store,
                "ws-1",
                "cpu.usage",
                &serde_json::json!({"operator": ">", "threshold": 90.0}),
                None,
                Utc::now(),
            )
            .unwrap();
        assert!(!result.triggered);
        assert_eq!(result.context["missing_current"], true);
    }

    #[test]
    fn validate_rejects_unknown_operator_and_bad_threshold() {
        let evaluator = ThresholdEvaluator;
        assert!(evaluator
            .validate(&serde_json::json!({"operator": "~", "threshold": 1.0}))
            .is_err());
        assert!(evaluator
            .validate(&serde_json::json!({"operator": ">"}))
            .is_err());
        assert!(evaluator
            .validate(&serde_json::json!({"operator": ">=", "threshold": 5.5}))
            .is_ok());
    }
}
