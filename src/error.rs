// movievec/src/error.rs
// Error taxonomy for the loader. Every category except per-object insert
// failure is fatal for the run; per-object failures are collected in the
// pipeline's FailureLog instead of surfacing here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed dataset payload: {0}")]
    Format(String),
    #[error("failed to parse record: {0}")]
    Parse(String),
    #[error("embedding API error: {0}")]
    EmbeddingApi(String),
    #[error("vector store error: {0}")]
    Store(String),
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
