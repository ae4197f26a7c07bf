use sentra_common::types::ConditionType;
use serde_json::Value;
use std::collections::HashMap;

use crate::conditions::anomaly::AnomalyEvaluator;
use crate::conditions::change::ChangeEvaluator;
use crate::conditions::pattern::PatternEvaluator;
use crate::conditions::threshold::ThresholdEvaluator;
use crate::error::ConfigError;
use crate::ConditionEvaluator;

/// Lookup table from the closed [`ConditionType`] enum to the evaluator
/// implementing it. `Default` registers all built-in evaluators, one per
/// variant.
///
/// # Examples
///
/// ```
/// use sentra_alert::registry::EvaluatorRegistry;
/// use sentra_common::types::ConditionType;
///
/// let registry = EvaluatorRegistry::default();
/// for ct in ConditionType::ALL {
///     assert!(registry.get(ct).is_some());
/// }
/// ```
pub struct EvaluatorRegistry {
    evaluators: HashMap<ConditionType, Box<dyn ConditionEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: HashMap::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn ConditionEvaluator>) {
        self.evaluators.insert(evaluator.condition_type(), evaluator);
    }

    pub fn get(&self, condition_type: ConditionType) -> Option<&dyn ConditionEvaluator> {
        self.evaluators.get(&condition_type).map(|e| e.as_ref())
    }

    /// Validates a config against the evaluator registered for its type.
    pub fn validate(
        &self,
        condition_type: ConditionType,
        config: &Value,
    ) -> Result<(), ConfigError> {
        match self.get(condition_type) {
            Some(evaluator) => evaluator.validate(config),
            None => Err(ConfigError::UnregisteredCondition(
                condition_type.to_string(),
            )),
        }
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ThresholdEvaluator));
        registry.register(Box::new(ChangeEvaluator));
        registry.register(Box::new(AnomalyEvaluator));
        registry.register(Box::new(PatternEvaluator));
        registry
    }
}
