// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod mirror;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use state::AppState;

/// Build the HTTP router: session API, WebSocket endpoints and static files
pub fn app(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .route(
            "/new-session",
            get(api::create_session).post(api::create_session),
        )
        .route("/session/{session_id}", get(api::get_session))
        .route("/ws", get(ws::ws_handler_without_session))
        .route("/ws/{session_id}", get(ws::ws_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
