//! Engine errors

use nl2sql_model::ModelError;
use nl2sql_store::StoreError;

/// Errors surfaced by enrichment, retrieval and question answering
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("top_k must be at least 1")]
    InvalidTopK,
}
