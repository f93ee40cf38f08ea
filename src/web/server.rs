//! Web server for dependency visualization
//!
//! Serves the JSON API over HTTP using Axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::analyzer::SystemAnalysis;

use super::routes;

/// Shared application state
pub struct AppState {
    pub analysis: SystemAnalysis,
}

/// Configuration for the web server
pub struct ServerConfig {
    pub port: u16,
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            open_browser: true,
        }
    }
}

/// Build the application router
pub fn router(analysis: SystemAnalysis) -> Router {
    let state = Arc::new(AppState { analysis });

    routes::api_routes()
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server and serve the analysis
pub async fn start_server(
    analysis: SystemAnalysis,
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(analysis);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "web server listening");

    let url = format!("http://localhost:{}/api/graph", config.port);
    eprintln!("Starting web server at {}", url);

    if config.open_browser {
        eprintln!("Opening browser...");
        if let Err(e) = open::that(&url) {
            eprintln!("Warning: Could not open browser: {}", e);
            eprintln!("Please open {} manually", url);
        }
    }

    eprintln!("Press Ctrl+C to stop the server");

    axum::serve(listener, app).await?;

    Ok(())
}
