//! Ingestion processor
//!
//! Core logic for one ingestion pass: listing fetch, candidate extraction,
//! dedup against the store, page scraping and insertion.

use crate::errors::IngestionError;
use crate::extract::{extract_candidates, extract_content, site_root, Candidate};
use articleforge_common::config::IngestionConfig;
use articleforge_common::db::{NewArticle, Repository};
use articleforge_common::errors::AppError;
use articleforge_common::metrics;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Counts of one ingestion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Candidate links taken from the listing page
    pub found: usize,
    /// New articles stored
    pub saved: usize,
    /// Duplicates and pages without enough text
    pub skipped: usize,
    /// Pages that failed to load or store
    pub failed: usize,
}

enum Outcome {
    Saved,
    Duplicate,
    TooShort,
}

/// Scrapes the listing page and stores new articles as Pending
pub struct Ingestor {
    config: IngestionConfig,
    repository: Repository,
    client: reqwest::Client,
}

impl Ingestor {
    pub fn new(config: IngestionConfig, repository: Repository) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IngestionError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            repository,
            client,
        })
    }

    /// Run one pass. Only a listing failure aborts it; per-candidate
    /// problems are logged and counted.
    #[instrument(skip(self), fields(listing = %self.config.listing_url))]
    pub async fn ingest(&self) -> Result<IngestReport, IngestionError> {
        info!("Starting ingestion pass");

        let listing = Url::parse(&self.config.listing_url).map_err(|e| IngestionError::InvalidUrl {
            url: self.config.listing_url.clone(),
            message: e.to_string(),
        })?;

        let html = self.fetch(listing.as_str()).await?;
        let candidates = extract_candidates(&html, &site_root(&listing), self.config.max_candidates);

        info!(found = candidates.len(), "Found candidate articles");

        let mut report = IngestReport {
            found: candidates.len(),
            ..Default::default()
        };

        for candidate in &candidates {
            match self.ingest_candidate(candidate).await {
                Ok(Outcome::Saved) => report.saved += 1,
                Ok(Outcome::Duplicate) | Ok(Outcome::TooShort) => report.skipped += 1,
                Err(e) => {
                    error!(url = %candidate.url, error = %e, "Failed to ingest article");
                    report.failed += 1;
                }
            }
        }

        metrics::record_ingestion(report.saved, report.skipped);

        info!(
            found = report.found,
            saved = report.saved,
            skipped = report.skipped,
            failed = report.failed,
            "Ingestion pass finished"
        );

        Ok(report)
    }

    async fn ingest_candidate(&self, candidate: &Candidate) -> Result<Outcome, IngestionError> {
        if self.repository.find_article_by_url(&candidate.url).await?.is_some() {
            info!(title = %candidate.title, "Skipped duplicate");
            return Ok(Outcome::Duplicate);
        }

        let html = self.fetch(&candidate.url).await?;

        let content = match extract_content(&html, self.config.max_content_chars) {
            Some(text) if text.chars().count() > self.config.min_content_chars => text,
            other => {
                warn!(
                    url = %candidate.url,
                    chars = other.map(|t| t.chars().count()).unwrap_or(0),
                    "Not enough article text, skipping"
                );
                return Ok(Outcome::TooShort);
            }
        };

        let created = self
            .repository
            .create_article(NewArticle {
                title: candidate.title.clone(),
                url: candidate.url.clone(),
                original_content: content,
            })
            .await;

        let article = match created {
            Ok(article) => article,
            Err(AppError::DuplicateArticle { url }) => {
                info!(url = %url, "Stored by a concurrent pass, skipping");
                return Ok(Outcome::Duplicate);
            }
            Err(e) => return Err(e.into()),
        };

        info!(article_id = %article.id, title = %article.title, "Saved article");
        Ok(Outcome::Saved)
    }

    async fn fetch(&self, url: &str) -> Result<String, IngestionError> {
        debug!(url = %url, "Fetching page");

        let fetch_error = |message: String| IngestionError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use articleforge_common::db::DbPool;
    use sea_orm::{ConnectOptions, Database};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn memory_repository() -> Repository {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let pool = DbPool::from_connection(Database::connect(opts).await.unwrap());
        pool.ensure_schema().await.unwrap();
        Repository::new(pool)
    }

    fn config(server: &MockServer) -> IngestionConfig {
        IngestionConfig {
            listing_url: format!("{}/blogs/", server.uri()),
            ..IngestionConfig::default()
        }
    }

    fn article_page(paragraph: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(format!(
            "<html><body><div class=\"entry-content\"><p>{paragraph}</p></div></body></html>"
        ))
    }

    const LONG_TEXT: &str = "Customer support automation has changed how small teams handle volume.";

    async fn mount_listing(server: &MockServer, slugs: &[&str]) {
        let links: String = slugs
            .iter()
            .map(|slug| format!(r#"<h2><a href="/blogs/{slug}/">Post {slug}</a></h2>"#))
            .collect();
        Mock::given(method("GET"))
            .and(path("/blogs/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(links))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_ingest_skips_stored_urls() {
        let server = MockServer::start().await;
        let repo = memory_repository().await;
        mount_listing(&server, &["a", "b", "c"]).await;

        for slug in ["a", "b"] {
            repo.create_article(NewArticle {
                title: format!("Post {slug}"),
                url: format!("{}/blogs/{slug}/", server.uri()),
                original_content: LONG_TEXT.to_string(),
            })
            .await
            .unwrap();
        }

        Mock::given(method("GET"))
            .and(path("/blogs/c/"))
            .respond_with(article_page(LONG_TEXT))
            .expect(1)
            .mount(&server)
            .await;

        let ingestor = Ingestor::new(config(&server), repo.clone()).unwrap();
        let report = ingestor.ingest().await.unwrap();

        assert_eq!(report.found, 3);
        assert_eq!(report.saved, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(repo.list_articles().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_ingest_twice_creates_no_duplicates() {
        let server = MockServer::start().await;
        let repo = memory_repository().await;
        mount_listing(&server, &["a", "b"]).await;

        for slug in ["a", "b"] {
            Mock::given(method("GET"))
                .and(path(format!("/blogs/{slug}/")))
                .respond_with(article_page(LONG_TEXT))
                .mount(&server)
                .await;
        }

        let ingestor = Ingestor::new(config(&server), repo.clone()).unwrap();
        assert_eq!(ingestor.ingest().await.unwrap().saved, 2);

        let second = ingestor.ingest().await.unwrap();
        assert_eq!(second.saved, 0);
        assert_eq!(second.skipped, 2);

        let stored = repo.list_articles().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|a| a.status == "pending"));
    }

    #[tokio::test]
    async fn test_short_and_broken_pages_are_not_stored() {
        let server = MockServer::start().await;
        let repo = memory_repository().await;
        mount_listing(&server, &["short", "broken", "good"]).await;

        Mock::given(method("GET"))
            .and(path("/blogs/short/"))
            .respond_with(article_page("Too short to keep."))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blogs/broken/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blogs/good/"))
            .respond_with(article_page(LONG_TEXT))
            .mount(&server)
            .await;

        let ingestor = Ingestor::new(config(&server), repo.clone()).unwrap();
        let report = ingestor.ingest().await.unwrap();

        assert_eq!(
            report,
            IngestReport {
                found: 3,
                saved: 1,
                skipped: 1,
                failed: 1,
            }
        );

        let stored = repo.list_articles().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].original_content, LONG_TEXT);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ingestor = Ingestor::new(config(&server), memory_repository().await).unwrap();
        let err = ingestor.ingest().await.unwrap_err();
        assert!(matches!(err, IngestionError::Fetch { .. }));
    }
}
