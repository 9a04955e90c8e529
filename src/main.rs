use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use pulse::config::{self, scoring::ScoringConfig};
use pulse::routes;
use pulse::services::cache::CacheService;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Vote routes
        pulse::handlers::vote::cast_vote,
        pulse::handlers::vote::retract_vote,
        pulse::handlers::vote::vote_stats,
        pulse::handlers::vote::refresh_decayed_weights,
        // Feedback routes
        pulse::handlers::feedback::trending_feedback,
        pulse::handlers::feedback::find_duplicates,
        // Panel routes
        pulse::handlers::panel::panel_health,
    ),
    components(
        schemas(
            pulse::response::ApiResponse<serde_json::Value>,
            pulse::error::AppError,
            // Votes
            pulse::services::vote::VoteStats,
            pulse::services::weight::RefreshOutcome,
            // Trending
            pulse::services::trending::TrendingItem,
            pulse::models::FeedbackModel,
            pulse::models::FeedbackState,
            pulse::models::ModerationStatus,
            // Duplicates
            pulse::services::similarity::DuplicateMatch,
            pulse::handlers::feedback::TrendingParams,
            pulse::handlers::feedback::DuplicateParams,
            // Panels
            pulse::services::quota::PanelHealth,
            pulse::services::quota::QuotaProgress,
            pulse::services::quota::QuotaStatus,
            pulse::services::quota::HealthSummary,
            pulse::models::PanelModel,
        )
    ),
    tags(
        (name = "votes", description = "Vote casting and aggregated stats"),
        (name = "feedback", description = "Trending ranking and duplicate detection"),
        (name = "panels", description = "Panel quota progress and health"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pulse API v{}...", env!("CARGO_PKG_VERSION"));

    // Fail fast on broken required configuration.
    let db_config = config::database::DatabaseConfig::from_env()?;
    let scoring = ScoringConfig::from_env();

    let db = config::database::connect(&db_config).await?;
    tracing::info!("Database connected successfully");

    // Redis/Cache is optional - graceful degradation if unavailable
    let cache = match config::redis::get_redis().await {
        Ok(conn) => {
            tracing::info!("Redis connected successfully");
            Some(CacheService::new(conn))
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    };

    let mut app = create_app().layer(Extension(db)).layer(Extension(scoring));

    if let Some(cache) = cache {
        app = app.layer(Extension(cache));
    }

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Pulse API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
