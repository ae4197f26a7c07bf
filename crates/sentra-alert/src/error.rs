use sentra_storage::error::StorageError;

/// A rule's condition config failed validation. Raised at rule create or
/// update time, never during evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// The config blob does not deserialize into the evaluator's schema.
    #[error("malformed condition config: {0}")]
    Malformed(String),

    #[error("no evaluator registered for condition type '{0}'")]
    UnregisteredCondition(String),
}

/// A condition evaluator could not reach a verdict, usually because metric
/// data could not be read. The engine logs it, treats the rule as
/// non-triggered, and continues the batch.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Eval: metric query failed: {0}")]
    Store(#[from] StorageError),

    #[error("Eval: {0}")]
    Config(#[from] ConfigError),
}

/// Errors surfaced by the top-level engine operations. Per-rule and
/// per-target failures are absorbed during batch evaluation; what escapes
/// here is terminal for the call itself (e.g. the rule list could not be
/// loaded, or the referenced alert does not exist).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    #[error("Engine: invalid condition config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
