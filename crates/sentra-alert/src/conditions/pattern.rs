use chrono::{DateTime, Duration, Utc};
use sentra_common::types::{ConditionType, MetricSample};
use sentra_storage::{MetricQuery, MetricStore};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::conditions::mean_and_std;
use crate::error::{ConfigError, EvalError};
use crate::{ConditionEvaluator, Evaluation};

/// Shapes fewer samples than this cannot express.
const MIN_SAMPLES: usize = 3;

/// A spike is the latest sample exceeding this multiple of the rest's mean.
const SPIKE_FACTOR: f64 = 2.0;

fn default_window_minutes() -> i64 {
    30
}

fn default_min_points() -> usize {
    MIN_SAMPLES
}

fn default_epsilon() -> f64 {
    1e-3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PatternKind {
    Increasing,
    Decreasing,
    Spike,
    FlatLine,
}

impl PatternKind {
    fn label(self) -> &'static str {
        match self {
            PatternKind::Increasing => "increasing",
            PatternKind::Decreasing => "decreasing",
            PatternKind::Spike => "spike",
            PatternKind::FlatLine => "flat line",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatternConfig {
    pattern: PatternKind,
    #[serde(default = "default_window_minutes")]
    window_minutes: i64,
    /// Run length for monotonic patterns.
    #[serde(default = "default_min_points")]
    min_points: usize,
    /// Standard-deviation bound below which a window counts as flat.
    #[serde(default = "default_epsilon")]
    epsilon: f64,
}

/// Detects qualitative shapes in a recent window of samples: monotonic
/// runs, spikes, and flat lines.
pub struct PatternEvaluator;

impl PatternEvaluator {
    fn parse(config: &Value) -> Result<PatternConfig, ConfigError> {
        let cfg: PatternConfig = serde_json::from_value(config.clone())
            .map_err(|e| ConfigError::Malformed(e.to_string()))?;
        if cfg.window_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "window_minutes",
                message: "must be positive".to_string(),
            });
        }
        if cfg.min_points < MIN_SAMPLES {
            return Err(ConfigError::InvalidValue {
                field: "min_points",
                message: format!("must be at least {MIN_SAMPLES}"),
            });
        }
        if !(cfg.epsilon > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "epsilon",
                message: "must be positive".to_string(),
            });
        }
        Ok(cfg)
    }

    fn monotonic_run(values: &[f64], increasing: bool) -> bool {
        values.windows(2).all(|pair| {
            if increasing {
                pair[1] > pair[0]
            } else {
                pair[1] < pair[0]
            }
        })
    }
}

impl ConditionEvaluator for PatternEvaluator {
    fn condition_type(&self) -> ConditionType {
        ConditionType::Pattern
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
        _current: Option<&MetricSample>,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvalError> {
        let cfg = Self::parse(config)?;

        let window = store.range(&MetricQuery {
            workspace_id: workspace_id.to_string(),
            metric_type: metric_type.to_string(),
            from: now - Duration::minutes(cfg.window_minutes),
            to: now,
        })?;
        let values: Vec<f64> = window.iter().map(|s| s.value).collect();

        let mut context = Map::new();
        context.insert("condition".into(), "pattern".into());
        context.insert("pattern".into(), cfg.pattern.label().into());
        context.insert("sample_count".into(), values.len().into());

        if values.len() < MIN_SAMPLES || values.len() < cfg.min_points {
            return Ok(Evaluation {
                triggered: false,
                context,
            });
        }

        let triggered = match cfg.pattern {
            PatternKind::Increasing | PatternKind::Decreasing => {
                let run = &values[values.len() - cfg.min_points..];
                context.insert("run_length".into(), cfg.min_points.into());
                Self::monotonic_run(run, cfg.pattern == PatternKind::Increasing)
            }
            PatternKind::Spike => {
                let (latest, rest) = values.split_last().expect("window has samples");
                let (rest_mean, _) = mean_and_std(rest);
                context.insert("latest".into(), (*latest).into());
                context.insert("rest_mean".into(), rest_mean.into());
                rest_mean > f64::EPSILON && *latest > SPIKE_FACTOR * rest_mean
            }
            PatternKind::FlatLine => {
                let (_, std_dev) = mean_and_std(&values);
                context.insert("std_dev".into(), std_dev.into());
                context.insert("epsilon".into(), cfg.epsilon.into());
                std_dev < cfg.epsilon
            }
        };

        Ok(Evaluation { triggered, context })
    }
}
