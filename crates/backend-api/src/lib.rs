mod error;
mod state;

pub mod routes;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::header::{AUTHORIZATION, CONTENT_TYPE},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Largest accepted upload request body.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/status", get(routes::status::get_status))
        // Login flow
        .route("/api/qr", post(routes::login::create_qr))
        .route("/api/logout", post(routes::login::logout))
        .route("/qr.png", get(routes::login::qr_image))
        // Roster
        .route("/api/chats", get(routes::chats::list_chats))
        .route("/api/chats/refresh", post(routes::chats::refresh_chats))
        // Templates
        .route("/api/templates", get(routes::templates::list_templates))
        .route("/api/templates", post(routes::templates::create_template))
        .route(
            "/api/templates/:template_id",
            put(routes::templates::update_template),
        )
        .route(
            "/api/templates/:template_id",
            delete(routes::templates::delete_template),
        )
        // Broadcast
        .route("/api/send-message", post(routes::send::send_message))
        .route("/api/upload", post(routes::upload::upload_files))
        .route(
            "/api/failed-messages",
            get(routes::failed::list_failed_messages),
        )
        .route(
            "/api/failed-messages/:record_id",
            delete(routes::failed::delete_failed_message),
        )
        // Status push channel
        .route("/ws", get(routes::websocket::websocket_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
