//! Polling loop
//!
//! Each cycle lists articles, picks the ones that need enrichment and hands
//! them to the processor one at a time. All waits end early on cancellation.

use crate::backend::BackendClient;
use crate::errors::EnrichmentError;
use crate::processor::{ArticleOutcome, EnrichmentProcessor};
use articleforge_common::api::ArticleResponse;
use articleforge_common::config::{EnrichmentPolicy, WorkerConfig};
use articleforge_common::db::models::ArticleStatus;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub candidates: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Pending articles, plus Processing ones whose claim has expired and
/// which still have attempts left
pub fn select_candidates(
    articles: Vec<ArticleResponse>,
    policy: &EnrichmentPolicy,
    now: DateTime<Utc>,
) -> Vec<ArticleResponse> {
    let cutoff = now - policy.reclaim_after();

    articles
        .into_iter()
        .filter(|article| match article.status {
            ArticleStatus::Pending => true,
            ArticleStatus::Processing => {
                article.attempt_count < policy.max_attempts
                    && article.claimed_at.is_some_and(|claimed| claimed < cutoff)
            }
            ArticleStatus::Completed | ArticleStatus::Failed => false,
        })
        .collect()
}

pub struct Worker {
    backend: Arc<BackendClient>,
    processor: EnrichmentProcessor,
    config: WorkerConfig,
    policy: EnrichmentPolicy,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        backend: Arc<BackendClient>,
        processor: EnrichmentProcessor,
        config: WorkerConfig,
        policy: EnrichmentPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            backend,
            processor,
            config,
            policy,
            shutdown,
        }
    }

    /// Poll until cancelled
    pub async fn run(&self) {
        info!(backend = %self.config.backend_url, "Enrichment worker started");

        while !self.shutdown.is_cancelled() {
            let wait = match self.cycle().await {
                Ok(summary) if summary.candidates == 0 => {
                    debug!("No articles to enrich");
                    self.config.poll_interval()
                }
                Ok(summary) => {
                    info!(
                        completed = summary.completed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Cycle finished"
                    );
                    // Progress means more work may be waiting; the article
                    // pause has already run.
                    if summary.completed > 0 {
                        continue;
                    }
                    self.config.poll_interval()
                }
                Err(EnrichmentError::BackendUnavailable(e)) => {
                    warn!(error = %e, "Waiting for backend");
                    self.config.backend_retry()
                }
                Err(e) => {
                    error!(error = %e, "Cycle failed");
                    self.config.poll_interval()
                }
            };

            self.pause(wait).await;
        }

        info!("Enrichment worker stopped");
    }

    /// One list-select-process pass
    pub async fn cycle(&self) -> Result<CycleSummary, EnrichmentError> {
        let articles = self.backend.list_articles().await?;
        let candidates = select_candidates(articles, &self.policy, Utc::now());

        let mut summary = CycleSummary {
            candidates: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            return Ok(summary);
        }

        info!(count = candidates.len(), "Found articles to enrich");

        for article in &candidates {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.processor.process(article).await? {
                ArticleOutcome::Completed => summary.completed += 1,
                ArticleOutcome::Skipped => summary.skipped += 1,
                ArticleOutcome::Failed => summary.failed += 1,
            }

            self.pause(self.config.article_pause()).await;
        }

        Ok(summary)
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}
