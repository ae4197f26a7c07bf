use chrono::{DateTime, Duration, Utc};
use sentra_common::types::{ConditionType, MetricSample};
use sentra_storage::{MetricQuery, MetricStore};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::conditions::mean_and_std;
use crate::error::{ConfigError, EvalError};
use crate::{ConditionEvaluator, Evaluation};

/// Baselines built from fewer samples than this are too noisy to score.
pub const MIN_BASELINE_SAMPLES: usize = 10;

const SENSITIVITY_RANGE: std::ops::RangeInclusive<f64> = 1.0..=5.0;

fn default_lookback_minutes() -> i64 {
    60
}

#[derive(Debug, Deserialize)]
struct AnomalyConfig {
    /// Z-score multiplier above which the current value is anomalous.
    sensitivity: f64,
    #[serde(default = "default_lookback_minutes")]
    lookback_minutes: i64,
}

/// Scores the current value against a mean/standard-deviation baseline
/// computed over a lookback window.
pub struct AnomalyEvaluator;

impl AnomalyEvaluator {
    fn parse(config: &Value) -> Result<AnomalyConfig, ConfigError> {
        let cfg: AnomalyConfig = serde_json::from_value(config.clone())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        if !SENSITIVITY_RANGE.contains(&cfg.sensitivity) {
            return Err(ConfigError::InvalidValue {
                field: "sensitivity",
                message: format!(
                    "must be between {} and {}",
                    SENSITIVITY_RANGE.start(),
                    SENSITIVITY_RANGE.end()
                ),
            });
        }
        if cfg.lookback_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "lookback_minutes",
                message: "must be positive".to_string(),
            });
        }
        Ok(cfg)
    }
}

impl ConditionEvaluator for AnomalyEvaluator {
    fn condition_type(&self) -> ConditionType {
        ConditionType::Anomaly
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
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvalError> {
        let cfg = Self::parse(config)?;

        let mut context = Map::new();
        context.insert("condition".into(), "anomaly".into());
        context.insert("sensitivity".into(), cfg.sensitivity.into());
        context.insert("lookback_minutes".into(), cfg.lookback_minutes.into());

        let current_value = match current {
            Some(sample) => Some(sample.value),
            None => store.latest(workspace_id, metric_type)?.map(|s| s.value),
        };
        let Some(value) = current_value else {
            context.insert("missing_current".into(), true.into());
            return Ok(Evaluation {
                triggered: false,
                context,
            });
        };
        context.insert("current_value".into(), value.into());

        let window = store.range(&MetricQuery {
            workspace_id: workspace_id.to_string(),
            metric_type: metric_type.to_string(),
            from: now - Duration::minutes(cfg.lookback_minutes),
            to: now,
        })?;
        context.insert("sample_count".into(), window.len().into());

        if window.len() < MIN_BASELINE_SAMPLES {
            // Too little history to call anything anomalous.
            return Ok(Evaluation {
                triggered: false,
                context,
            });
        }

        let values: Vec<f64> = window.iter().map(|s| s.value).collect();
        let (mean, std_dev) = mean_and_std(&values);
        context.insert("mean".into(), mean.into());
        context.insert("std_dev".into(), std_dev.into());

        if std_dev < f64::EPSILON {
            // Zero variance: no z-score is meaningful.
            context.insert("zero_variance".into(), true.into());
            return Ok(Evaluation {
                triggered: false,
                context,
            });
        }

        let z_score = (value - mean).abs() / std_dev;
        context.insert("z_score".into(), z_score.into());

        Ok(Evaluation {
            triggered: z_score > cfg.sensitivity,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_storage::metrics::SqliteMetricStore;

    fn store_with_history(values: &[f64]) -> SqliteMetricStore {
        let store = SqliteMetricStore::open_in_memory().unwrap();
        let now = Utc::now();
        let samples: Vec<MetricSample> = values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample {
                timestamp: now - Duration::minutes(values.len() as i64 - i as i64),
                workspace_id: "ws-1".into(),
                metric_type: "latency.p99".into(),
                value: *v,
            })
            .collect();
        store.record_batch(&samples).unwrap();
        store
    }

    fn evaluate(store: &SqliteMetricStore, current: f64, sensitivity: f64) -> Evaluation {
        let sample = MetricSample {
            timestamp: Utc::now(),
            workspace_id: "ws-1".into(),
            metric_type: "latency.p99".into(),
            value: current,
        };
        AnomalyEvaluator
            .evaluate(
                store,
                "ws-1",
                "latency.p99",
                &serde_json::json!({"sensitivity": sensitivity}),
                Some(&sample),
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn fewer_than_ten_samples_never_triggers() {
        let store = store_with_history(&[10.0; 9]);
        let result = evaluate(&store, 10_000.0, 1.0);
        assert!(!result.triggered);
        assert_eq!(result.context["sample_count"], 9);
    }

    #[test]
    fn zero_variance_baseline_never_triggers() {
        let store = store_with_history(&[10.0; 12]);
        let result = evaluate(&store, 10_000.0, 1.0);
        assert!(!result.triggered);
        assert_eq!(result.context["zero_variance"], true);
    }

    #[test]
    fn outlier_triggers_against_noisy_baseline() {
        let store = store_with_history(&[
            10.0, 11.0, 9.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9, 10.3, 9.7, 10.0,
        ]);
        let result = evaluate(&store, 30.0, 3.0);
        assert!(result.triggered);
        assert!(result.context["z_score"].as_f64().unwrap() > 3.0);
    }

    #[test]
    fn in_band_value_does_not_trigger() {
        let store = store_with_history(&[
            10.0, 11.0, 9.0, 10.5, 9.5, 10.2, 9.8, 10.1, 9.9, 10.3, 9.7, 10.0,
        ]);
        assert!(!evaluate(&store, 10.4, 3.0).triggered);
    }

    #[test]
    fn validate_enforces_sensitivity_range() {
        let evaluator = AnomalyEvaluator;
        assert!(evaluator
            .validate(&serde_json::json!({"sensitivity": 0.5}))
            .is_err());
        assert!(evaluator
            .validate(&serde_json::json!({"sensitivity": 6.0}))
            .is_err());
        assert!(evaluator
            .validate(&serde_json::json!({"sensitivity": 2.5}))
            .is_ok());
        assert!(evaluator
            .validate(&serde_json::json!({"sensitivity": 2.5, "lookback_minutes": 0}))
            .is_err());
    }
}
