//! Web-search context for a rewrite
//!
//! Searches for the article title, scrapes paragraph text from a couple of
//! result pages and returns it with the URLs that contributed.

use crate::errors::EnrichmentError;
use articleforge_common::config::SearchConfig;
use articleforge_common::text::{bare_host, collapse_whitespace, host_matches_domain, paragraphs, truncate_chars};
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

/// Context used when the search request itself fails
pub const SEARCH_FALLBACK: &str =
    "Search failed. Please improve the article using general professional knowledge.";

/// Research text plus the URLs it was taken from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    pub text: String,
    pub references: Vec<String>,
}

fn result_containers() -> &'static Selector {
    static RESULTS: OnceLock<Selector> = OnceLock::new();
    RESULTS.get_or_init(|| Selector::parse("div.g").expect("static selector"))
}

fn result_link() -> &'static Selector {
    static LINK: OnceLock<Selector> = OnceLock::new();
    LINK.get_or_init(|| Selector::parse("a[href]").expect("static selector"))
}

pub struct ContextGatherer {
    config: SearchConfig,
    excluded_domains: Vec<String>,
    search_client: reqwest::Client,
    page_client: reqwest::Client,
}

impl ContextGatherer {
    /// `site_domain` is the site being enriched; its pages are never cited
    pub fn new(config: &SearchConfig, site_domain: Option<String>) -> Result<Self, EnrichmentError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            EnrichmentError::ConfigError(format!("Invalid search endpoint {}: {}", config.endpoint, e))
        })?;

        let mut excluded_domains = Vec::new();
        if let Some(host) = endpoint.host_str() {
            excluded_domains.push(bare_host(host).to_string());
        }
        excluded_domains.extend(site_domain.map(|d| bare_host(&d).to_string()));

        let build = |timeout: Option<Duration>| {
            let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            builder
                .build()
                .map_err(|e| EnrichmentError::ConfigError(format!("Failed to create HTTP client: {}", e)))
        };

        Ok(Self {
            config: config.clone(),
            excluded_domains,
            search_client: build(None)?,
            page_client: build(Some(Duration::from_secs(config.page_timeout_secs)))?,
        })
    }

    /// Gather research for `query`. Never fails: a failed search yields the
    /// fallback text and no references.
    #[instrument(skip(self))]
    pub async fn gather(&self, query: &str) -> ContextBundle {
        let links = match self.search(query).await {
            Ok(links) => links,
            Err(e) => {
                warn!(error = %e, "Search failed, using fallback context");
                return ContextBundle {
                    text: SEARCH_FALLBACK.to_string(),
                    references: Vec::new(),
                };
            }
        };

        let mut bundle = ContextBundle::default();

        for link in links {
            match self.page_snippet(&link).await {
                Ok(Some(snippet)) => {
                    bundle.text.push_str(&format!("SOURCE ({}): {}\n\n", link, snippet));
                    bundle.references.push(link);
                }
                Ok(None) => info!(url = %link, "Source had too little text, skipped"),
                Err(e) => warn!(url = %link, error = %e, "Skipped source"),
            }
        }

        info!(sources = bundle.references.len(), "Context gathered");
        bundle
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, reqwest::Error> {
        let html = self
            .search_client
            .get(&self.config.endpoint)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(self.result_links(&html))
    }

    /// First link of each result block, filtered, at most `max_results`
    fn result_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);

        document
            .select(result_containers())
            .filter_map(|result| result.select(result_link()).next())
            .filter_map(|anchor| anchor.value().attr("href"))
            .filter(|href| self.is_citable(href))
            .map(str::to_string)
            .take(self.config.max_results)
            .collect()
    }

    fn is_citable(&self, href: &str) -> bool {
        let Ok(url) = Url::parse(href) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };

        !self
            .excluded_domains
            .iter()
            .any(|domain| host_matches_domain(host, domain))
    }

    async fn page_snippet(&self, url: &str) -> Result<Option<String>, reqwest::Error> {
        let html = self
            .page_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let document = Html::parse_document(&html);
        let text = collapse_whitespace(&paragraphs(document.root_element()).join(" "));
        let snippet = truncate_chars(&text, self.config.max_snippet_chars);

        if snippet.chars().count() > self.config.min_snippet_chars {
            Ok(Some(snippet.to_string()))
        } else {
            Ok(None)
        }
    }
}
