//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all ArticleForge metrics
pub const METRICS_PREFIX: &str = "articleforge";

/// Buckets for text-generation latency (seconds, typically slow)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 20.00, 30.00, 60.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_articles_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total articles scraped and stored"
    );

    describe_counter!(
        format!("{}_ingestion_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Candidates skipped during ingestion"
    );

    // Enrichment metrics
    describe_counter!(
        format!("{}_enrichment_total", METRICS_PREFIX),
        Unit::Count,
        "Enrichment attempts by outcome"
    );

    describe_histogram!(
        format!("{}_enrichment_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end enrichment latency per article"
    );

    describe_counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total text-generation requests"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Text-generation latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record the outcome of an ingestion pass
pub fn record_ingestion(saved: usize, skipped: usize) {
    counter!(format!("{}_articles_ingested_total", METRICS_PREFIX)).increment(saved as u64);
    counter!(format!("{}_ingestion_skipped_total", METRICS_PREFIX)).increment(skipped as u64);
}

/// Record one enrichment attempt; `outcome` is `completed` or an error kind
pub fn record_enrichment(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_enrichment_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_enrichment_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record text-generation metrics
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_generation_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_generation_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}
