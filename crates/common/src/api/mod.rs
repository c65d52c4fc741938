//! JSON shapes exchanged between the gateway, the worker and the UI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::models::{Article, ArticleStatus, FailureKind};
use crate::db::ArticleChanges;
use crate::errors::AppError;

/// Article as served by `GET /api/articles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub original_content: String,
    pub updated_content: String,
    pub reference_links: Vec<String>,
    pub status: ArticleStatus,
    pub attempt_count: i32,
    pub error_kind: Option<FailureKind>,
    pub last_error: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl TryFrom<Article> for ArticleResponse {
    type Error = AppError;

    fn try_from(article: Article) -> Result<Self, Self::Error> {
        let status = article.article_status()?;
        let reference_links = article.links();
        let error_kind = article.failure_kind();

        Ok(Self {
            id: article.id,
            title: article.title,
            url: article.url,
            original_content: article.original_content,
            updated_content: article.updated_content,
            reference_links,
            status,
            attempt_count: article.attempt_count,
            error_kind,
            last_error: article.last_error,
            claimed_at: article.claimed_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: article.created_at.with_timezone(&Utc),
            last_updated: article.last_updated.with_timezone(&Utc),
        })
    }
}

/// Body of `PATCH /api/articles/{id}`; only these fields are writable
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PatchArticleRequest {
    #[validate(length(min = 1, max = 1000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_links: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArticleStatus>,
}

impl From<PatchArticleRequest> for ArticleChanges {
    fn from(req: PatchArticleRequest) -> Self {
        Self {
            title: req.title,
            updated_content: req.updated_content,
            reference_links: req.reference_links,
            status: req.status,
        }
    }
}

/// Body of `POST /api/articles/{id}/failure`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub error_kind: FailureKind,
    pub message: String,
}

/// Response of `GET /api/seed`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedResponse {
    pub message: String,
    pub found: usize,
    pub saved: usize,
}
