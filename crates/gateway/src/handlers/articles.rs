//! Article handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use articleforge_common::{
    api::{ArticleResponse, FailureReport, PatchArticleRequest},
    db::{ArticleChanges, Repository},
    errors::{AppError, Result},
};

fn article_id(path: std::result::Result<Path<Uuid>, PathRejection>) -> Result<Uuid> {
    path.map(|Path(id)| id).map_err(|e| AppError::InvalidFormat {
        message: format!("Invalid article id: {}", e.body_text()),
    })
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(value)| value).map_err(|e| AppError::Validation {
        message: e.body_text(),
        field: None,
    })
}

/// List all articles, most recently updated first
pub async fn list_articles(State(state): State<AppState>) -> Result<Json<Vec<ArticleResponse>>> {
    let repo = Repository::new(state.db.clone());

    let articles = repo
        .list_articles()
        .await?
        .into_iter()
        .map(ArticleResponse::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(articles))
}

/// Partially update an article
pub async fn patch_article(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    body: std::result::Result<Json<PatchArticleRequest>, JsonRejection>,
) -> Result<Json<ArticleResponse>> {
    let id = article_id(path)?;
    let request = json_body(body)?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let changes = ArticleChanges::from(request);
    let repo = Repository::new(state.db.clone());
    let article = repo.patch_article(id, changes).await?;

    tracing::info!(article_id = %id, status = %article.status, "Article updated");

    Ok(Json(article.try_into()?))
}

/// Claim an article for enrichment
pub async fn claim_article(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ArticleResponse>> {
    let id = article_id(path)?;
    let repo = Repository::new(state.db.clone());

    let article = repo.claim_article(id, &state.config.enrichment).await?;

    tracing::info!(article_id = %id, attempt = article.attempt_count, "Article claimed");

    Ok(Json(article.try_into()?))
}

/// Record a failed enrichment attempt
pub async fn record_failure(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    body: std::result::Result<Json<FailureReport>, JsonRejection>,
) -> Result<Json<ArticleResponse>> {
    let id = article_id(path)?;
    let report = json_body(body)?;
    let repo = Repository::new(state.db.clone());

    let article = repo
        .record_failure(
            id,
            report.error_kind,
            &report.message,
            state.config.enrichment.max_attempts,
        )
        .await?;

    tracing::warn!(
        article_id = %id,
        error_kind = report.error_kind.as_str(),
        status = %article.status,
        attempt = article.attempt_count,
        "Enrichment failure recorded"
    );

    Ok(Json(article.try_into()?))
}
