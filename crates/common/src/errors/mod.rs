//! Error types shared by the ArticleForge services
//!
//! `AppError` is what the store, config loader and text generator return.
//! The gateway renders it as `{"error": {"code", "message", "details"}}`
//! with a status derived from the variant.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Machine-readable code carried in every error body
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidFormat,
    ArticleNotFound,
    DuplicateArticle,
    InvalidStatusTransition,
    NotClaimable,
    DatabaseError,
    ConnectionError,
    GenerationError,
    ScrapeError,
    InternalError,
    ConfigurationError,
    SerializationError,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Article not found: {id}")]
    ArticleNotFound { id: String },

    /// Another insert already stored this source URL
    #[error("Duplicate article: {url}")]
    DuplicateArticle { url: String },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Article {id} is not claimable")]
    NotClaimable { id: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Text generation error: {message}")]
    Generation { message: String },

    #[error("Scraping failed: {message}")]
    Scrape { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::ArticleNotFound { .. } => ErrorCode::ArticleNotFound,
            AppError::DuplicateArticle { .. } => ErrorCode::DuplicateArticle,
            AppError::InvalidStatusTransition { .. } => ErrorCode::InvalidStatusTransition,
            AppError::NotClaimable { .. } => ErrorCode::NotClaimable,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Generation { .. } => ErrorCode::GenerationError,
            AppError::Scrape { .. } => ErrorCode::ScrapeError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            AppError::ArticleNotFound { .. } => StatusCode::NOT_FOUND,

            AppError::DuplicateArticle { .. }
            | AppError::InvalidStatusTransition { .. }
            | AppError::NotClaimable { .. } => StatusCode::CONFLICT,

            AppError::Generation { .. } => StatusCode::BAD_GATEWAY,

            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Scrape { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(error = %message, code = ?code, status = status.as_u16(), "Server error");
        } else if self.is_client_error() {
            tracing::warn!(error = %message, code = ?code, status = status.as_u16(), "Client error");
        }

        let details = match &self {
            AppError::Validation { field: Some(field), .. } => Some(serde_json::json!({ "field": field })),
            AppError::InvalidStatusTransition { from, to } => {
                Some(serde_json::json!({ "from": from, "to": to }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}
