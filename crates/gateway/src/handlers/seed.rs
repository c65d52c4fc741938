//! Ingestion trigger

use axum::{extract::State, Json};

use crate::AppState;
use articleforge_common::{api::SeedResponse, errors::Result};

/// Run one ingestion pass and report what it stored
pub async fn seed(State(state): State<AppState>) -> Result<Json<SeedResponse>> {
    let report = state.ingestor.ingest().await?;

    Ok(Json(SeedResponse {
        message: format!("Scraping finished. Saved {} new articles.", report.saved),
        found: report.found,
        saved: report.saved,
    }))
}
