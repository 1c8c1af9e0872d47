//! Local web dashboard for editing the settings, switching tabs and
//! previewing the display.

pub mod config;
pub mod handlers;
pub mod page;
pub mod router;
pub mod state;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;
pub use state::AppState;

use crate::error::{BusboxError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Serve the dashboard until the server fails.
pub async fn start_web_server(config: WebConfig, state: Arc<AppState>) -> Result<()> {
    let app = create_app(state);

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| BusboxError::config_error(format!("Invalid bind address: {}", e)))?;

    info!("Starting busbox web server on http://{}", addr);
    info!("Dashboard available at http://{}/", addr);
    info!("Speech served at http://{}/tts.mp3", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BusboxError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| BusboxError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
