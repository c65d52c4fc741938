//! HTTP client for the gateway's articles API

use crate::errors::EnrichmentError;
use articleforge_common::api::{ArticleResponse, FailureReport, PatchArticleRequest};
use articleforge_common::db::models::{ArticleStatus, FailureKind};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub struct BackendClient {
    client: reqwest::Client,
    articles_url: String,
}

impl BackendClient {
    /// `base_url` is the gateway root, e.g. `http://localhost:5000`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            articles_url: format!("{}/api/articles", base_url.trim_end_matches('/')),
        })
    }

    /// Every stored article
    pub async fn list_articles(&self) -> Result<Vec<ArticleResponse>, EnrichmentError> {
        let response = self
            .client
            .get(&self.articles_url)
            .send()
            .await
            .map_err(|e| EnrichmentError::BackendUnavailable(e.to_string()))?;

        decode(response).await
    }

    /// Take the claim on an article; `None` when another worker holds it
    pub async fn claim_article(&self, id: Uuid) -> Result<Option<ArticleResponse>, EnrichmentError> {
        let response = self
            .client
            .post(format!("{}/{}/claim", self.articles_url, id))
            .send()
            .await
            .map_err(|e| EnrichmentError::BackendUnavailable(e.to_string()))?;

        if response.status() == StatusCode::CONFLICT {
            debug!(article_id = %id, "Article already claimed");
            return Ok(None);
        }

        decode(response).await.map(Some)
    }

    /// Store the rewrite and mark the article Completed
    pub async fn complete_article(
        &self,
        id: Uuid,
        updated_content: String,
        reference_links: Vec<String>,
    ) -> Result<ArticleResponse, EnrichmentError> {
        let body = PatchArticleRequest {
            updated_content: Some(updated_content),
            reference_links: Some(reference_links),
            status: Some(ArticleStatus::Completed),
            ..Default::default()
        };

        let response = self
            .client
            .patch(format!("{}/{}", self.articles_url, id))
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichmentError::PersistFailed(e.to_string()))?;

        decode(response)
            .await
            .map_err(|e| EnrichmentError::PersistFailed(e.to_string()))
    }

    /// Record a failed attempt
    pub async fn report_failure(
        &self,
        id: Uuid,
        error_kind: FailureKind,
        message: &str,
    ) -> Result<ArticleResponse, EnrichmentError> {
        let body = FailureReport {
            error_kind,
            message: message.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/{}/failure", self.articles_url, id))
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichmentError::BackendUnavailable(e.to_string()))?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, EnrichmentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EnrichmentError::Backend {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| EnrichmentError::BackendUnavailable(format!("Invalid response body: {}", e)))
}
