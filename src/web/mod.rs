//! Web server and API endpoints for the fill station dashboard.
//!
//! This is a thin collaborator over [`Station`]: it only reads snapshots and
//! forwards band commands.

pub mod config;
pub mod export;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{Result, StationError};
use crate::station::Station;
use tracing::info;

/// Start the web server with the provided configuration and station.
pub async fn start_web_server(config: WebConfig, station: Station) -> Result<()> {
    let app = create_app(&config, station);

    let addr = config.validate()?;

    info!("Starting fill station web server on http://{}", addr);
    info!("Dashboard available at http://{}/", addr);
    info!("API endpoint: http://{}/api/telemetry", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| StationError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| StationError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
