use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use super::app_state::AppState;
use super::rate_limit::{ApiRateLimiters, api_rate_limit, ws_rate_limit};
use super::{rest_api, ws_handler};

/// Extra request body allowance on top of the image itself: base64
/// expansion plus title, body and JSON framing.
const POST_BODY_OVERHEAD: usize = 128 * 1024;

/// Build the axum router with all HTTP and WebSocket routes.
pub fn build_router(state: Arc<AppState>, rate_limiters: Arc<ApiRateLimiters>) -> Router {
    // Restrict CORS to the configured public_url origin (or allow any for localhost dev)
    let cors = if state.auth_config.allows_any_origin() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origin = state
            .auth_config
            .public_url
            .trim_end_matches('/')
            .parse::<HeaderValue>()
            .unwrap_or_else(|_| HeaderValue::from_static("https://localhost"));
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Data URLs are ~4/3 the size of the decoded image.
    let post_body_limit = state.max_image_size / 3 * 4 + POST_BODY_OVERHEAD;

    let ws_routes = Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .layer(axum::middleware::from_fn(ws_rate_limit));

    let api_routes = Router::new()
        .route("/api/me", get(rest_api::get_me))
        .route("/api/me/snippets", get(rest_api::list_my_snippets))
        // Communities
        .route("/api/communities", post(rest_api::create_community))
        .route(
            "/api/communities/top",
            get(rest_api::list_top_communities),
        )
        .route("/api/communities/{id}", get(rest_api::get_community))
        .route(
            "/api/communities/{id}/membership",
            put(rest_api::join_community).delete(rest_api::leave_community),
        )
        .route(
            "/api/communities/{id}/image",
            put(rest_api::update_community_image),
        )
        // Posts
        .route(
            "/api/communities/{id}/posts",
            get(rest_api::list_posts).post(rest_api::create_post),
        )
        .route(
            "/api/communities/{id}/votes",
            get(rest_api::list_my_votes),
        )
        .route(
            "/api/posts/{id}",
            get(rest_api::get_post).delete(rest_api::delete_post),
        )
        .route("/api/posts/{id}/vote", post(rest_api::vote_post))
        // Limits (public)
        .route("/api/config/limits", get(rest_api::get_limits))
        .layer(DefaultBodyLimit::max(post_body_limit))
        .layer(axum::middleware::from_fn(api_rate_limit));

    Router::new()
        .merge(ws_routes)
        .merge(api_routes)
        // Uploaded post and community images
        .nest_service("/media", ServeDir::new(&state.media_dir))
        .layer(cors)
        // Inject rate limiters into all request extensions
        .layer(axum::Extension(rate_limiters))
        .with_state(state)
}
