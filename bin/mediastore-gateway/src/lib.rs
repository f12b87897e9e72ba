//! mediastore Gateway - HTTP API for media upload and retrieval

pub mod error;
pub mod handlers;

pub use error::ApiError;
pub use handlers::AppState;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Multipart framing allowance on top of the largest accepted part
const BODY_OVERHEAD: usize = 64 * 1024;

/// Build the HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    let max_part = usize::try_from(state.media.limits().max_part_size).unwrap_or(usize::MAX);
    let body_limit = max_part.saturating_add(BODY_OVERHEAD);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/media/{entity}",
            get(handlers::list_media).post(handlers::upload_media),
        )
        .route(
            "/media/{entity}/avatar",
            get(handlers::download_avatar)
                .put(handlers::upload_avatar)
                .post(handlers::upload_avatar),
        )
        .route("/media/{entity}/{media_id}", get(handlers::download_media))
        .route("/media/{entity}/{media_id}/info", get(handlers::media_info))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
