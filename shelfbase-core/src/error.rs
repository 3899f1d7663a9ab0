// shelfbase-core/src/error.rs
use thiserror::Error;

/// Errors raised inside shelfbase.
///
/// Construction errors (`InvalidCollectionKey`, `InvalidSchema`) are returned
/// to the caller directly. Everything else is caught at the collection
/// operation boundary and reported through a [`crate::Response`].
#[derive(Error, Debug)]
pub enum ShelfError {
    #[error("Invalid collection key: {0}")]
    InvalidCollectionKey(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("{0}")]
    SchemaValidation(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted collection '{key}': {reason}")]
    Corruption { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShelfError>;

impl ShelfError {
    /// Validation failure built from a list of issue messages
    pub fn validation(issues: &[String]) -> Self {
        ShelfError::SchemaValidation(issues.join("; "))
    }
}
