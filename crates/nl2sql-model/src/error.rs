//! Errors raised by model collaborators

/// Errors from the intent service, SQL service, completion and embedding backends
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API Error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ModelError::InvalidResponse(err.to_string())
        } else {
            ModelError::Network(err.to_string())
        }
    }
}
