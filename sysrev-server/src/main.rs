use anyhow::{Context, Result};
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sysrev_server::api::api_router;
use sysrev_server::config::{Config, StorageBackend};
use sysrev_server::{AppState, InMemoryRepository, SqliteRepository, StudyReviewRepository};

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "sysrev"
    })))
}

async fn help_handler() -> Json<serde_json::Value> {
    let version = sysrev_server::get_version();
    let review = "/api/v1/researcher/{researcher}/systematic-study/{systematicStudy}/study-review/{studyReview}";
    Json(json!({
        "service": "sysrev",
        "version": version,
        "description": "Selection and extraction classification of studies in systematic reviews",
        "endpoints": [
            { "path": "/health", "method": "GET", "authentication": "None" },
            { "path": "/help", "method": "GET", "authentication": "None" },
            {
                "path": "/api/v1/researcher/{researcher}/systematic-study",
                "method": "POST",
                "description": "Create a systematic study owned by the researcher",
                "authentication": "Bearer token when API_AUTH_TOKEN is set"
            },
            {
                "path": format!("{review}/selection-status"),
                "method": "PATCH",
                "description": "Change the selection status: UNCLASSIFIED, INCLUDED or EXCLUDED",
                "authentication": "Bearer token when API_AUTH_TOKEN is set"
            },
            {
                "path": format!("{review}/extraction-status"),
                "method": "PATCH",
                "description": "Change the extraction status: UNCLASSIFIED, INCLUDED or EXCLUDED",
                "authentication": "Bearer token when API_AUTH_TOKEN is set"
            },
            {
                "path": format!("{review}/duplicated/{{duplicate}}"),
                "method": "PATCH",
                "description": "Mark another study review as a duplicate of this one",
                "authentication": "Bearer token when API_AUTH_TOKEN is set"
            },
            {
                "path": format!("{review}/history"),
                "method": "GET",
                "description": "Classification history, oldest first",
                "authentication": "Bearer token when API_AUTH_TOKEN is set"
            }
        ],
        "configuration": {
            "optional_env_vars": [
                "PORT (default: 3000)",
                "STATE_DIR (default: current directory)",
                "STORAGE_BACKEND (sqlite or memory, default: sqlite)",
                "API_AUTH_TOKEN (default: unset, API open)",
                "RUST_LOG (default: info)"
            ]
        }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting sysrev server {}", sysrev_server::get_version());

    let config = Config::from_env().context("Failed to load configuration from environment variables")?;

    let repository: Arc<dyn StudyReviewRepository> = match config.storage_backend {
        StorageBackend::Sqlite => {
            let db_path = config.database_path();
            info!("Using state database: {}", db_path.display());
            Arc::new(SqliteRepository::new(&db_path).context("Failed to initialize SQLite database")?)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; study reviews are lost on restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    if config.api_auth_token.is_none() {
        info!("API_AUTH_TOKEN not set, /api/v1 routes are unauthenticated");
    }

    let app_state = Arc::new(AppState::new(repository, config.api_auth_token.clone()));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/help", get(help_handler))
        .merge(api_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
