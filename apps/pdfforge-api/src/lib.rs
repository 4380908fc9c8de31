//! pdfforge API
//!
//! Thin HTTP layer over `pdfforge-core`:
//! - `POST /merge`   multipart `files` (repeated)
//! - `POST /split`   multipart `file`, `start_page`, `end_page`
//! - `POST /convert` multipart `images` (repeated)
//! - `GET  /jobs/:id/artifact` retained result of an earlier job

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod upload;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Build the router with CORS, tracing and the upload size limit applied
pub fn app(state: Arc<AppState>) -> Router {
    let origin = match state.config.allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(
                "Invalid allowed origin {:?}, allowing any",
                state.config.allowed_origin
            );
            AllowOrigin::any()
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION, handlers::JOB_ID_HEADER]);

    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Assembly operations
        .route("/merge", post(handlers::merge))
        .route("/split", post(handlers::split))
        .route("/convert", post(handlers::convert))
        // Retrieval by reference
        .route("/jobs/:id/artifact", get(handlers::get_artifact))
        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
