//! Web application router and middleware setup.

use crate::web::handlers::{self, SharedState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the dashboard application with all routes and middleware.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/save_wifi", post(handlers::save_wifi))
        .route("/save_stop", post(handlers::save_stop))
        .route("/save_train_stop", post(handlers::save_train_stop))
        .route("/save_api_key", post(handlers::save_api_key))
        .route("/save_tab_name", post(handlers::save_tab_name))
        .route("/select_tab", post(handlers::select_tab))
        .route("/add_tab", post(handlers::add_tab))
        .route("/remove_tab", post(handlers::remove_tab))
        .route("/say", post(handlers::say))
        .route("/tts.mp3", get(handlers::tts_audio))
        .route("/api/health", get(handlers::health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
