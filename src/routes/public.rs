use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no credentials: the auth flows and read-only access to
/// approved listings.
///
/// Every post read here goes through the approved-only filter. A pending or
/// rejected post is indistinguishable from a missing one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Auth flows ---
        // Login-or-signup by email or phone, OAuth find-or-create, token refresh, logout.
        .route("/auth-email", post(handlers::email_auth))
        .route("/auth-phone", post(handlers::phone_auth))
        .route("/auth-oauth", post(handlers::oauth_auth))
        .route("/refresh-token", post(handlers::refresh_token))
        .route("/logout", post(handlers::logout))
        // GET /category
        .route("/category", get(handlers::list_categories))
        // GET /posts?categoryId=...&search=...
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // 404 unless the post is approved.
        .route("/posts/{id}", get(handlers::get_post))
        // GET /posts/{id}/reviews
        .route("/posts/{id}/reviews", get(handlers::list_post_reviews))
}
