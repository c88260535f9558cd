//! services/api/src/bin/api.rs

use api_lib::{
    bootstrap::boot_from_config,
    config::Config,
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Stores, Recover & Boot the Tracker ---
    let tracker = boot_from_config(&config).await?;
    info!("Boot recovery: {:?}", tracker.recovery_outcome());

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(tracker, config.clone()));

    let cors = match config.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            warn!("ALLOWED_ORIGIN '{}' is not a valid header value; CORS disabled.", config.allowed_origin);
            CorsLayer::new()
        }
    }
    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
    .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let app = Router::new()
        .merge(api_router(app_state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors);

    // --- 5. Start the Server ---
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for shutdown signal: {}", e);
        }
        signal.cancel();
    });

    info!("Starting server on {}", config.bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    // --- 6. Flush Background Writes ---
    info!("Shutting down; waiting for mirror and backup writes...");
    app_state.tracker.lock().await.settle().await;
    info!("Shutdown complete.");

    Ok(())
}
