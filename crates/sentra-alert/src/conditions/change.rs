use chrono::{DateTime, Duration, Utc};
use sentra_common::types::{ConditionType, MetricSample};
use sentra_storage::{MetricQuery, MetricStore};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::conditions::mean_and_std;
use crate::error::{ConfigError, EvalError};
use crate::{ConditionEvaluator, Evaluation};

/// Half-width of the band around `now - comparison_period` that supplies
/// baseline samples. Ingestion is not expected to land samples on exact
/// period boundaries.
const BASELINE_BAND_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ComparisonPeriod {
    Hour,
    Day,
    Week,
}

impl ComparisonPeriod {
    fn duration(self) -> Duration {
        match self {
            ComparisonPeriod::Hour => Duration::hours(1),
            ComparisonPeriod::Day => Duration::days(1),
            ComparisonPeriod::Week => Duration::weeks(1),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ComparisonPeriod::Hour => "previous hour",
            ComparisonPeriod::Day => "previous day",
            ComparisonPeriod::Week => "previous week",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ChangeKind {
    Percent,
    Absolute,
}

#[derive(Debug, Deserialize)]
struct ChangeConfig {
    comparison_period: ComparisonPeriod,
    change_type: ChangeKind,
    threshold: f64,
}

/// Compares the current value against a baseline from a named comparison
/// period and triggers when the delta (percentage or absolute) reaches the
/// configured threshold.
pub struct ChangeEvaluator;

impl ChangeEvaluator {
    fn parse(config: &Value) -> Result<ChangeConfig, ConfigError> {
        let cfg: ChangeConfig = serde_json::from_value(config.clone())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        if !cfg.threshold.is_finite() || cfg.threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "threshold",
                message: "must be a non-negative finite number".to_string(),
            });
        }
        Ok(cfg)
    }
}

impl ConditionEvaluator for ChangeEvaluator {
    fn condition_type(&self) -> ConditionType {
        ConditionType::Change
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
        context.insert("condition".into(), "change".into());
        context.insert("comparison_period".into(), cfg.comparison_period.label().into());
        context.insert(
            "change_type".into(),
            match cfg.change_type {
                ChangeKind::Percent => "percent",
                ChangeKind::Absolute => "absolute",
            }
            .into(),
        );
        context.insert("threshold".into(), cfg.threshold.into());

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

        let target = now - cfg.comparison_period.duration();
        let band = Duration::minutes(BASELINE_BAND_MINUTES);
        let baseline_samples = store.range(&MetricQuery {
            workspace_id: workspace_id.to_string(),
            metric_type: metric_type.to_string(),
            from: target - band,
            to: target + band,
        })?;

        if baseline_samples.is_empty() {
            context.insert("baseline_missing".into(), true.into());
            return Ok(Evaluation {
                triggered: false,
                context,
            });
        }

        let values: Vec<f64> = baseline_samples.iter().map(|s| s.value).collect();
        let (baseline, _) = mean_and_std(&values);
        let delta = value - baseline;
        context.insert("baseline".into(), baseline.into());
        context.insert("delta".into(), delta.into());

        let triggered = match cfg.change_type {
            ChangeKind::Percent => {
                if baseline.abs() < f64::EPSILON {
                    // No meaningful percentage off a zero baseline.
                    context.insert("zero_baseline".into(), true.into());
                    false
                } else {
                    let change_percent = (delta / baseline) * 100.0;
                    context.insert("change_percent".into(), change_percent.into());
                    change_percent.abs() >= cfg.threshold
                }
            }
            ChangeKind::Absolute => delta.abs() >= cfg.threshold,
        };

        Ok(Evaluation { triggered, context })
    }
}
