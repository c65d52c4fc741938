//! Enrichment worker error types

use articleforge_common::db::models::FailureKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Backend unreachable: {0}")]
    BackendUnavailable(String),

    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    #[error("Saving enriched article failed: {0}")]
    PersistFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EnrichmentError {
    /// Classification reported to the backend
    pub fn error_kind(&self) -> FailureKind {
        match self {
            EnrichmentError::GenerationFailed(_) => FailureKind::Generation,
            EnrichmentError::PersistFailed(_) => FailureKind::Persistence,
            _ => FailureKind::Internal,
        }
    }
}
