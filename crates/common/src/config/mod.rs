//! Configuration management for ArticleForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - The well-known variables `DATABASE_URL`, `PORT`, `OPENAI_API_KEY`, `BACKEND_URL`
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration (gateway)
    #[serde(default)]
    pub server: ServerConfig,

    /// Article store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Text-generation service configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Listing-page scraper configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Web search used for context gathering
    #[serde(default)]
    pub search: SearchConfig,

    /// Enrichment worker loop configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Claim and retry policy shared by the gateway and the worker
    #[serde(default)]
    pub enrichment: EnrichmentPolicy,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Covers `/api/seed`, which scrapes synchronously.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection string. Required by every process that touches the store.
    pub url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create the articles table on startup if it does not exist
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Provider: openai, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the text-generation service
    pub api_key: Option<String>,

    /// API base URL (for OpenAI-compatible endpoints)
    pub api_base: Option<String>,

    /// Chat model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Blog listing page to scrape
    #[serde(default = "default_listing_url")]
    pub listing_url: String,

    /// Maximum candidate links taken from the listing page
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Extracted text must be longer than this many characters
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Stored original content is capped at this many characters
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Page fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Search endpoint; the query is sent as the `q` parameter
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Maximum number of result pages to scrape
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-page fetch timeout in seconds
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    /// Snippets longer than this are cut
    #[serde(default = "default_max_snippet_chars")]
    pub max_snippet_chars: usize,

    /// Snippets must be longer than this to be kept
    #[serde(default = "default_min_snippet_chars")]
    pub min_snippet_chars: usize,

    /// Domain of the site being enriched. Defaults to the listing page host.
    pub site_domain: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Base URL of the gateway
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Sleep between polls when nothing is pending
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Sleep before retrying when the backend is unreachable
    #[serde(default = "default_backend_retry")]
    pub backend_retry_secs: u64,

    /// Pause between two enriched articles
    #[serde(default = "default_article_pause")]
    pub article_pause_secs: u64,

    /// Characters of original content included in the rewrite prompt
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Backend request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentPolicy {
    /// Claims allowed per article before it is marked Failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// A Processing article may be reclaimed once its claim is this old
    #[serde(default = "default_reclaim_after")]
    pub reclaim_after_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name attached to startup logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_request_timeout() -> u64 { 120 }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_true() -> bool { true }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_listing_url() -> String { "https://beyondchats.com/blogs/".to_string() }
fn default_max_candidates() -> usize { 5 }
fn default_min_content_chars() -> usize { 50 }
fn default_max_content_chars() -> usize { 3000 }
fn default_fetch_timeout() -> u64 { 20 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}
fn default_search_endpoint() -> String { "https://www.google.com/search".to_string() }
fn default_max_results() -> usize { 2 }
fn default_page_timeout() -> u64 { 5 }
fn default_max_snippet_chars() -> usize { 800 }
fn default_min_snippet_chars() -> usize { 50 }
fn default_backend_url() -> String { "http://localhost:5000".to_string() }
fn default_poll_interval() -> u64 { 5 }
fn default_backend_retry() -> u64 { 5 }
fn default_article_pause() -> u64 { 2 }
fn default_excerpt_chars() -> usize { 1500 }
fn default_backend_timeout() -> u64 { 30 }
fn default_max_attempts() -> i32 { 3 }
fn default_reclaim_after() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "articleforge".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__WORKER__POLL_INTERVAL_SECS=10
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            // Conventional variables win over everything else
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("llm.api_key", std::env::var("OPENAI_API_KEY").ok())?
            .set_override_option("worker.backend_url", std::env::var("BACKEND_URL").ok())?

            .build()?;

        config.try_deserialize()
    }

    /// The store connection string; its absence is fatal at startup
    pub fn database_url(&self) -> Result<&str> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "DATABASE_URL is missing".to_string(),
            })
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Domain of the site being enriched, excluded from search results
    pub fn site_domain(&self) -> Option<String> {
        self.search.site_domain.clone().or_else(|| {
            url::Url::parse(&self.ingestion.listing_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
        })
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backend_retry(&self) -> Duration {
        Duration::from_secs(self.backend_retry_secs)
    }

    pub fn article_pause(&self) -> Duration {
        Duration::from_secs(self.article_pause_secs)
    }
}

impl EnrichmentPolicy {
    pub fn reclaim_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reclaim_after_secs as i64)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            auto_migrate: default_true(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            listing_url: default_listing_url(),
            max_candidates: default_max_candidates(),
            min_content_chars: default_min_content_chars(),
            max_content_chars: default_max_content_chars(),
            fetch_timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            page_timeout_secs: default_page_timeout(),
            max_snippet_chars: default_max_snippet_chars(),
            min_snippet_chars: default_min_snippet_chars(),
            site_domain: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            poll_interval_secs: default_poll_interval(),
            backend_retry_secs: default_backend_retry(),
            article_pause_secs: default_article_pause(),
            excerpt_chars: default_excerpt_chars(),
            request_timeout_secs: default_backend_timeout(),
        }
    }
}

impl Default for EnrichmentPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            reclaim_after_secs: default_reclaim_after(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}
