//! ArticleForge Common Library
//!
//! Shared code for all ArticleForge services including:
//! - Article entity, repository and schema bootstrap
//! - JSON wire types for the articles API
//! - Text-generation client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod text;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use llm::TextGenerator;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
