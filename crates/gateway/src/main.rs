//! ArticleForge API Gateway
//!
//! The HTTP entry point for the article store.
//! Handles:
//! - Article listing and partial updates
//! - Enrichment claims and failure reports
//! - On-demand ingestion
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use articleforge_common::{
    config::AppConfig,
    db::DbPool,
    metrics::{self, GENERATION_BUCKETS},
    Repository,
};
use articleforge_ingestion::Ingestor;
use axum::{
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub ingestor: Arc<Ingestor>,
}

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
        "Starting ArticleForge API Gateway v{}",
        articleforge_common::VERSION
    );

    // A missing store is fatal
    if let Err(e) = config.database_url() {
        tracing::error!(error = %e, "Refusing to start without a database");
        return Err(e.into());
    }

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port)))
            .set_buckets_for_metric(
                Matcher::Suffix("generation_duration_seconds".to_string()),
                GENERATION_BUCKETS,
            )?
            .install()?;
        info!(port = config.observability.metrics_port, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;

    let ingestor = Ingestor::new(config.ingestion.clone(), Repository::new(db.clone()))?;

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        ingestor: Arc::new(ingestor),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Article endpoints
        .route("/articles", get(handlers::articles::list_articles))
        .route("/articles/{id}", patch(handlers::articles::patch_article))
        .route("/articles/{id}/claim", post(handlers::articles::claim_article))
        .route("/articles/{id}/failure", post(handlers::articles::record_failure))

        // Ingestion trigger
        .route("/seed", get(handlers::seed::seed))
        .route_layer(axum::middleware::from_fn(middleware::track_requests));

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use articleforge_common::api::ArticleResponse;
    use articleforge_common::db::models::ArticleStatus;
    use articleforge_common::db::NewArticle;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sea_orm::{ConnectOptions, Database};
    use tower::ServiceExt;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_state(listing_url: &str) -> AppState {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = DbPool::from_connection(Database::connect(opts).await.unwrap());
        db.ensure_schema().await.unwrap();

        let mut config = AppConfig::default();
        config.ingestion.listing_url = listing_url.to_string();

        let ingestor = Ingestor::new(config.ingestion.clone(), Repository::new(db.clone())).unwrap();

        AppState {
            config: Arc::new(config),
            db,
            ingestor: Arc::new(ingestor),
        }
    }

    async fn seed_article(state: &AppState, url: &str) -> Uuid {
        Repository::new(state.db.clone())
            .create_article(NewArticle {
                title: "Why response time matters".to_string(),
                url: url.to_string(),
                original_content: "Customers expect answers within minutes, not hours or days.".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_articles() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;
        seed_article(&state, "https://blog.example.com/a").await;

        let (status, body) = send(
            &state,
            Request::get("/api/articles").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let articles: Vec<ArticleResponse> = serde_json::from_value(body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].status, ArticleStatus::Pending);
        assert!(articles[0].reference_links.is_empty());
    }

    #[tokio::test]
    async fn test_patch_unknown_id_is_404() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;

        let uri = format!("/api/articles/{}", Uuid::new_v4());
        let (status, body) = send(
            &state,
            json_request("PATCH", &uri, serde_json::json!({ "title": "New title" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "ARTICLE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_patch_rejects_unknown_fields() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;
        let id = seed_article(&state, "https://blog.example.com/a").await;

        let (status, _) = send(
            &state,
            json_request(
                "PATCH",
                &format!("/api/articles/{id}"),
                serde_json::json!({ "url": "https://evil.example.com" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_patch_cannot_set_processing() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;
        let id = seed_article(&state, "https://blog.example.com/a").await;

        let (status, body) = send(
            &state,
            json_request(
                "PATCH",
                &format!("/api/articles/{id}"),
                serde_json::json!({ "status": "Processing" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATUS_TRANSITION");

        let (status, body) = send(
            &state,
            json_request("POST", &format!("/api/articles/{id}/claim"), serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Processing");
        assert!(body["claimed_at"].is_string());
    }

    #[tokio::test]
    async fn test_claim_then_complete_then_no_going_back() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;
        let id = seed_article(&state, "https://blog.example.com/a").await;

        let claim = || json_request("POST", &format!("/api/articles/{id}/claim"), serde_json::json!({}));

        let (status, body) = send(&state, claim()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Processing");

        let (status, _) = send(&state, claim()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &state,
            json_request(
                "PATCH",
                &format!("/api/articles/{id}"),
                serde_json::json!({
                    "updated_content": "<p>Better</p>",
                    "reference_links": ["https://ref.example.org/x"],
                    "status": "Completed"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Completed");
        assert_eq!(body["reference_links"][0], "https://ref.example.org/x");

        let (status, _) = send(
            &state,
            json_request(
                "PATCH",
                &format!("/api/articles/{id}"),
                serde_json::json!({ "status": "Pending" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_failure_report_keeps_processing() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;
        let id = seed_article(&state, "https://blog.example.com/a").await;

        send(&state, json_request("POST", &format!("/api/articles/{id}/claim"), serde_json::json!({}))).await;

        let (status, body) = send(
            &state,
            json_request(
                "POST",
                &format!("/api/articles/{id}/failure"),
                serde_json::json!({ "error_kind": "generation", "message": "timeout" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Processing");
        assert_eq!(body["error_kind"], "generation");
        assert_eq!(body["last_error"], "timeout");
    }

    #[tokio::test]
    async fn test_seed_runs_ingestion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<h2><a href="/blogs/one/">One</a></h2>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blogs/one/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<article><p>Live chat converts more visitors when replies arrive quickly.</p></article>",
            ))
            .mount(&server)
            .await;

        let state = test_state(&format!("{}/blogs/", server.uri())).await;
        let (status, body) = send(
            &state,
            Request::get("/api/seed").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["found"], 1);
        assert_eq!(body["saved"], 1);
    }

    #[tokio::test]
    async fn test_seed_listing_failure_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blogs/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let state = test_state(&format!("{}/blogs/", server.uri())).await;
        let (status, body) = send(
            &state,
            Request::get("/api/seed").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]["message"].as_str().unwrap().starts_with("Scraping failed: "));
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let state = test_state("http://127.0.0.1:9/blogs/").await;

        let (status, body) = send(&state, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&state, Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "up");
    }
}
