//! Registry error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry API error (status {status_code}): {message}")]
    Api {
        status_code: u16,
        message: String,
    },

    #[error("{resource} '{key}' not found")]
    NotFound {
        resource: String,
        key: String,
    },

    #[error("Invalid request parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for RegistryError {
    fn from(err: anyhow::Error) -> Self {
        RegistryError::Config(err.to_string())
    }
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
