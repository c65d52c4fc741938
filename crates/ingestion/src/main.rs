//! ArticleForge Ingestion
//!
//! Runs one ingestion pass against the configured listing page:
//! 1. Connects to the article store
//! 2. Scrapes new articles
//! 3. Prints the pass report as JSON and exits

use anyhow::Context;
use articleforge_common::{config::AppConfig, db::DbPool, Repository, VERSION};
use articleforge_ingestion::Ingestor;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }

    info!("Starting ArticleForge Ingestion v{}", VERSION);

    config.database_url().context("DATABASE_URL is required")?;
    let db = DbPool::new(&config.database)
        .await
        .context("Failed to connect to database")?;

    let ingestor = Ingestor::new(config.ingestion.clone(), Repository::new(db))?;
    let report = ingestor.ingest().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
