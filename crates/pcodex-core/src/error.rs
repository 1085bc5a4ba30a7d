use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The embedding model could not be loaded or failed to produce vectors.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// No usable persisted index. The caller should trigger a rebuild.
    #[error("Index missing: {0}")]
    IndexMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn model(err: impl std::fmt::Display) -> Self {
        Self::ModelUnavailable(err.to_string())
    }

    pub fn index_missing(reason: impl Into<String>) -> Self {
        Self::IndexMissing(reason.into())
    }

    /// True when rebuilding the index is the expected remedy.
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Self::IndexMissing(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
