//! Article entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Enrichment lifecycle of an article
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArticleStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ArticleStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Processing => "processing",
            ArticleStatus::Completed => "completed",
            ArticleStatus::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle moving forward.
    ///
    /// Re-stating the current status is allowed and leaves it unchanged.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;

        *self == next
            || matches!(
                (self, next),
                (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
            )
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArticleStatus::Pending => "Pending",
            ArticleStatus::Processing => "Processing",
            ArticleStatus::Completed => "Completed",
            ArticleStatus::Failed => "Failed",
        };
        f.write_str(label)
    }
}

impl FromStr for ArticleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ArticleStatus::Pending),
            "processing" => Ok(ArticleStatus::Processing),
            "completed" => Ok(ArticleStatus::Completed),
            "failed" => Ok(ArticleStatus::Failed),
            other => Err(AppError::InvalidFormat {
                message: format!("unknown article status '{}'", other),
            }),
        }
    }
}

/// Classification of an enrichment failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The text-generation call failed or produced nothing
    Generation,
    /// Writing the result back to the store failed
    Persistence,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Generation => "generation",
            FailureKind::Persistence => "persistence",
            FailureKind::Internal => "internal",
        }
    }
}

impl FromStr for FailureKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation" => Ok(FailureKind::Generation),
            "persistence" => Ok(FailureKind::Persistence),
            "internal" => Ok(FailureKind::Internal),
            other => Err(AppError::InvalidFormat {
                message: format!("unknown failure kind '{}'", other),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Source URL, the ingestion dedup key
    #[sea_orm(column_type = "Text", unique)]
    pub url: String,

    #[sea_orm(column_type = "Text")]
    pub original_content: String,

    /// Rewritten HTML, empty until completed
    #[sea_orm(column_type = "Text")]
    pub updated_content: String,

    /// JSON array of cited URLs
    #[sea_orm(column_type = "JsonBinary")]
    pub reference_links: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub attempt_count: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_kind: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub claimed_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub last_updated: DateTimeWithTimeZone,
}

impl Model {
    /// Get the article status as an enum
    pub fn article_status(&self) -> Result<ArticleStatus, AppError> {
        self.status.parse()
    }

    /// Reference links as a list; malformed JSON reads as no links
    pub fn links(&self) -> Vec<String> {
        serde_json::from_value(self.reference_links.clone()).unwrap_or_default()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error_kind.as_deref().and_then(|k| k.parse().ok())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
