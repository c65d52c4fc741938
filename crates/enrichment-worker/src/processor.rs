//! Enrichment processor
//!
//! Takes one article through claim, research, rewrite and write-back.

use crate::backend::BackendClient;
use crate::context::ContextGatherer;
use crate::errors::EnrichmentError;
use articleforge_common::api::ArticleResponse;
use articleforge_common::llm::TextGenerator;
use articleforge_common::metrics;
use articleforge_common::text::truncate_chars;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// What happened to one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleOutcome {
    Completed,
    /// Another worker holds the claim
    Skipped,
    /// The attempt failed and was reported
    Failed,
}

/// Rewrite prompt for an article and its research
pub fn build_prompt(original_content: &str, context: &str, excerpt_chars: usize) -> String {
    format!(
        "Original Article: \"{}...\"\n\n\
         New Research: {}\n\n\
         Task: Rewrite the article to be more professional.\n\
         Use HTML tags (<p>, <h3>, <ul>).",
        truncate_chars(original_content, excerpt_chars),
        context
    )
}

pub struct EnrichmentProcessor {
    backend: Arc<BackendClient>,
    gatherer: ContextGatherer,
    generator: Arc<dyn TextGenerator>,
    excerpt_chars: usize,
}

impl EnrichmentProcessor {
    pub fn new(
        backend: Arc<BackendClient>,
        gatherer: ContextGatherer,
        generator: Arc<dyn TextGenerator>,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            backend,
            gatherer,
            generator,
            excerpt_chars,
        }
    }

    /// Claim and enrich one article. Only a failed claim request is returned
    /// as an error; failures after the claim are reported to the backend.
    #[instrument(skip(self, article), fields(article_id = %article.id, title = %article.title))]
    pub async fn process(&self, article: &ArticleResponse) -> Result<ArticleOutcome, EnrichmentError> {
        let Some(claimed) = self.backend.claim_article(article.id).await? else {
            info!("Claim lost to another worker, skipping");
            return Ok(ArticleOutcome::Skipped);
        };

        info!(attempt = claimed.attempt_count, "Processing article");
        let start = Instant::now();

        match self.enrich(&claimed).await {
            Ok(()) => {
                metrics::record_enrichment(start.elapsed().as_secs_f64(), "completed");
                info!("Finished article");
                Ok(ArticleOutcome::Completed)
            }
            Err(e) => {
                let kind = e.error_kind();
                metrics::record_enrichment(start.elapsed().as_secs_f64(), kind.as_str());
                error!(error = %e, error_kind = kind.as_str(), "Enrichment failed");

                match self.backend.report_failure(claimed.id, kind, &e.to_string()).await {
                    Ok(updated) => info!(status = %updated.status, "Failure recorded"),
                    Err(report_err) => warn!(error = %report_err, "Could not record failure"),
                }

                Ok(ArticleOutcome::Failed)
            }
        }
    }

    async fn enrich(&self, article: &ArticleResponse) -> Result<(), EnrichmentError> {
        let context = self.gatherer.gather(&article.title).await;
        let prompt = build_prompt(&article.original_content, &context.text, self.excerpt_chars);

        let start = Instant::now();
        let generated = self.generator.generate(&prompt).await;
        metrics::record_generation(
            start.elapsed().as_secs_f64(),
            self.generator.model_name(),
            generated.is_ok(),
        );

        let content = generated.map_err(|e| EnrichmentError::GenerationFailed(e.to_string()))?;

        self.backend
            .complete_article(article.id, content, context.references)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("Short original.", "SOURCE (https://a.example): text\n\n", 1500);
        assert_eq!(
            prompt,
            "Original Article: \"Short original....\"\n\n\
             New Research: SOURCE (https://a.example): text\n\n\n\n\
             Task: Rewrite the article to be more professional.\n\
             Use HTML tags (<p>, <h3>, <ul>)."
        );
    }

    #[test]
    fn test_prompt_uses_excerpt_only() {
        let original = "a".repeat(2000);
        let prompt = build_prompt(&original, "ctx", 1500);
        assert!(prompt.contains(&format!("\"{}...\"", "a".repeat(1500))));
        assert!(!prompt.contains(&"a".repeat(1501)));
    }
}
