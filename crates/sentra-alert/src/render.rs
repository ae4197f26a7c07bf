//! Rendering of alert titles and messages from a rule plus the evaluation
//! context, at alert creation time. The context already carries every
//! number the message needs.

use sentra_common::types::{ConditionType, Rule};
use serde_json::{Map, Value};

pub fn render_title(rule: &Rule) -> String {
    rule.name.clone()
}

pub fn render_message(rule: &Rule, context: &Map<String, Value>) -> String {
    let metric = &rule.metric_type;
    match rule.condition_type {
        ConditionType::Threshold => {
            match (
                text(context, "operator_label"),
                num(context, "threshold"),
                num(context, "current_value"),
            ) {
                (Some(op), Some(threshold), Some(current)) => {
                    format!("{metric} is {op} {threshold:.1} (current {current:.2})")
                }
                _ => fallback(metric),
            }
        }
        ConditionType::Change => match (text(context, "comparison_period"), num(context, "threshold")) {
            (Some(period), Some(threshold)) => {
                if let Some(pct) = num(context, "change_percent") {
                    format!("{metric} changed by {pct:.1}% vs {period} (threshold {threshold:.1}%)")
                } else if let Some(delta) = num(context, "delta") {
                    format!("{metric} changed by {delta:.2} vs {period} (threshold {threshold:.1})")
                } else {
                    fallback(metric)
                }
            }
            _ => fallback(metric),
        },
        ConditionType::Anomaly => {
            match (
                num(context, "z_score"),
                num(context, "mean"),
                num(context, "current_value"),
            ) {
                (Some(z), Some(mean), Some(current)) => format!(
                    "{metric} is {z:.1} standard deviations from its baseline (mean {mean:.2}, current {current:.2})"
                ),
                _ => fallback(metric),
            }
        }
        ConditionType::Pattern => match (text(context, "pattern"), num(context, "sample_count")) {
            (Some(pattern), Some(count)) => {
                format!("{metric} shows a {pattern} pattern over the last {count:.0} samples")
            }
            _ => fallback(metric),
        },
    }
}

fn fallback(metric: &str) -> String {
    format!("{metric} met its rule condition")
}

fn num(context: &Map<String, Value>, key: &str) -> Option<f64> {
    context.get(key).and_then(Value::as_f64)
}

fn text<'a>(context: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    context.get(key).and_then(Value::as_str)
}
