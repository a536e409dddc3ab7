//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Documents
        .route("/documents", post(handlers::upload_document))
        // Envelopes
        .route("/envelopes", get(handlers::list_envelopes))
        .route("/envelopes", post(handlers::create_envelope))
        .route("/envelopes/:id", get(handlers::get_envelope))
        .route("/envelopes/:id", delete(handlers::delete_envelope))
        .route("/envelopes/:id/recipients", post(handlers::add_recipient))
        .route(
            "/envelopes/:id/recipients/:recipient_id",
            delete(handlers::remove_recipient),
        )
        .route("/envelopes/:id/fields", post(handlers::add_field))
        .route("/envelopes/:id/fields/:field_id", delete(handlers::remove_field))
        .route("/envelopes/:id/send", post(handlers::send_envelope))
        .route("/envelopes/:id/cancel", post(handlers::cancel_envelope))
        .route(
            "/envelopes/:id/resend/:recipient_id",
            post(handlers::resend_recipient),
        )
        .route("/envelopes/:id/render", post(handlers::retry_render))
        .route("/envelopes/:id/document", get(handlers::download_document))
        .route("/envelopes/:id/audit", get(handlers::get_audit))
        .route("/envelopes/:id/signatures", get(handlers::list_signatures))
        .route("/renders/failed", get(handlers::list_failed_renders))
        // Signing
        .route("/sign/:token", get(handlers::view_envelope))
        .route("/sign/:token/fields/:field_id", put(handlers::fill_field))
        .route("/sign/:token/complete", post(handlers::complete))
        .route("/sign/:token/decline", post(handlers::decline));

    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TraceLayer::new_for_http());

    let router = if config.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
