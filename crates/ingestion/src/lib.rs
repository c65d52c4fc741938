//! ArticleForge ingestion
//!
//! Scrapes the configured blog listing and stores new articles as Pending.

pub mod errors;
pub mod extract;
pub mod processor;

pub use errors::IngestionError;
pub use processor::{IngestReport, Ingestor};
