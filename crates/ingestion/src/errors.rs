//! Ingestion error types

use articleforge_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<AppError> for IngestionError {
    fn from(e: AppError) -> Self {
        IngestionError::DatabaseError(e.to_string())
    }
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::ConfigError(message) => AppError::Configuration { message },
            IngestionError::DatabaseError(message) => AppError::Internal { message },
            other => AppError::Scrape {
                message: other.to_string(),
            },
        }
    }
}
