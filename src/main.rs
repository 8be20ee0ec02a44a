//! QR Resource Registry - Main Application Entry Point
//!
//! This is a REST API server that registers resources (survey-like records
//! with a name, description and optional form URL), mints a scannable QR
//! code for each one, and validates codes scanned back through a camera
//! against the registry.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Store**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: externally issued session tokens, SHA-256 hashed
//! - **Codec**: QR generation to PNG, QR recognition over camera frames
//! - **Format**: JSON requests/responses (PNG for code images)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create store connection pool
//! 3. Run store migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::{services::resource_store::PgResourceStore, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create store pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Store pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Store migrations complete");

    // Assemble shared state: pool for session lookups, the store adapter,
    // and the (initially empty) scan session slot
    let state = AppState {
        pool: pool.clone(),
        store: Arc::new(PgResourceStore::new(pool)),
        scanner: Arc::new(tokio::sync::Mutex::new(None)),
    };

    // Create authenticated routes (API endpoints)
    let authenticated_routes = Router::new()
        // Resource registry routes
        .route(
            "/api/v1/resources",
            post(handlers::resources::create_resource),
        )
        .route("/api/v1/resources", get(handlers::resources::list_resources))
        .route(
            "/api/v1/resources/{id}",
            delete(handlers::resources::delete_resource),
        )
        .route(
            "/api/v1/resources/{id}/code",
            get(handlers::resources::resource_code),
        )
        // Payload validation route
        .route("/api/v1/scans", post(handlers::scans::validate_scan))
        // Scan session routes
        .route(
            "/api/v1/scanner/session",
            post(handlers::scanner::start_session),
        )
        .route(
            "/api/v1/scanner/session",
            get(handlers::scanner::session_state),
        )
        .route(
            "/api/v1/scanner/session",
            delete(handlers::scanner::stop_session),
        )
        .route(
            "/api/v1/scanner/frames",
            post(handlers::scanner::ingest_frame),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        // Merge authenticated routes
        .merge(authenticated_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share application state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
