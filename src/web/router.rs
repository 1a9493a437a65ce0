//! Web application router and middleware setup.

use crate::station::Station;
use crate::web::config::WebConfig;
use crate::web::handlers;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, station: Station) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::index))
        .route("/api/telemetry", get(handlers::get_telemetry))
        .route("/api/connection", get(handlers::get_connection))
        .route("/api/report", get(handlers::get_report))
        .route("/api/report.csv", get(handlers::export_csv))
        .route("/api/band/:state", get(handlers::band_command))
        .route("/api/health", get(handlers::health_check))
        .with_state(station);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
