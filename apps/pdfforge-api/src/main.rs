//! pdfforge API server
//!
//! Accepts PDF and image uploads and returns one assembled PDF per request.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use pdfforge_api::{app, AppState, Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pdfforge_api=info".parse()?)
                .add_directive("pdfforge_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing pdfforge API...");
    let config = Config::from_env();
    let port = config.port;
    let state = Arc::new(AppState::new(config)?);

    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting pdfforge API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
