/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use sentra_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "rule",
///     id: "rule-99".to_string(),
/// };
/// assert!(err.to_string().contains("rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying SeaORM / SQL error.
    #[error("Storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// An underlying SQLite error from the metric store.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (e.g. config_json columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A column held a value that does not parse into its domain type.
    #[error("Storage: invalid value in column '{column}': {message}")]
    Decode {
        column: &'static str,
        message: String,
    },

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
