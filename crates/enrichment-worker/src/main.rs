//! ArticleForge Enrichment Worker
//!
//! Polls the gateway for articles awaiting enrichment:
//! 1. Claims an article
//! 2. Gathers web-search context for its title
//! 3. Has the text-generation service rewrite it
//! 4. Writes the rewrite and its references back

mod backend;
mod context;
mod errors;
mod processor;
mod worker;

use crate::backend::BackendClient;
use crate::context::ContextGatherer;
use crate::processor::EnrichmentProcessor;
use crate::worker::Worker;
use articleforge_common::{
    config::AppConfig,
    llm::create_generator,
    metrics::{self, GENERATION_BUCKETS},
    VERSION,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }

    info!(
        service = %config.observability.service_name,
        "Starting ArticleForge Enrichment Worker v{}",
        VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port)))
            .set_buckets_for_metric(
                Matcher::Suffix("generation_duration_seconds".to_string()),
                GENERATION_BUCKETS,
            )?
            .install()?;
    }
    metrics::register_metrics();

    // Initialize text generation
    let generator = create_generator(&config.llm)?;
    info!(model = %generator.model_name(), "Text generator initialized");

    let backend = Arc::new(BackendClient::new(
        &config.worker.backend_url,
        Duration::from_secs(config.worker.request_timeout_secs),
    )?);
    let gatherer = ContextGatherer::new(&config.search, config.site_domain())?;
    let processor = EnrichmentProcessor::new(
        backend.clone(),
        gatherer,
        generator,
        config.worker.excerpt_chars,
    );

    // Cancel the loop on Ctrl+C / SIGTERM
    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let worker = Worker::new(
        backend,
        processor,
        config.worker.clone(),
        config.enrichment.clone(),
        shutdown,
    );
    worker.run().await;

    info!("Enrichment worker shutting down");
    Ok(())
}

async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current article..."),
        _ = terminate => info!("Received SIGTERM, finishing current article..."),
    }

    token.cancel();
}
