//! API Routes
//!
//! Configures the Axum router with all photo cache endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cancel_handler, flush_handler, health_handler, image_handler, stats_handler,
    viewport_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /image?url=` - Cached image as PNG, fetched on a miss
/// - `POST /flush` - Sync the disk journal
/// - `POST /cancel` - Cancel all in-flight fetches
/// - `PUT /viewport` - Change the decode target size
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router with all endpoints
    Router::new()
        .route("/image", get(image_handler))
        .route("/flush", post(flush_handler))
        .route("/cancel", post(cancel_handler))
        .route("/viewport", put(viewport_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
