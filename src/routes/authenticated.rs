use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. The router is wrapped in `auth_middleware`
/// by `create_router`, and every handler receives the resolved `AuthUser`.
///
/// Ownership is checked per resource in the handlers: the owner or a
/// moderator may modify, anyone else gets 403.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /upload/post-image
        // Multipart `files` parts in, public URLs out.
        .route("/upload/post-image", post(handlers::upload_post_images))
        // GET /me, GET /me/posts
        // The caller's profile and all of their posts, whatever the status.
        .route("/me", get(handlers::get_me))
        .route("/me/posts", get(handlers::get_my_posts))
        // --- Categories ---
        .route("/category", post(handlers::create_category))
        .route(
            "/category/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        // --- Posts ---
        // POST /posts
        // New posts start pending unless the author is a moderator.
        .route("/posts", post(handlers::create_post))
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // --- Orders ---
        .route(
            "/orders",
            post(handlers::create_order).get(handlers::list_orders),
        )
        .route(
            "/orders/{id}",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        // --- Reviews ---
        .route("/reviews", post(handlers::create_review))
        .route(
            "/reviews/{id}",
            put(handlers::update_review).delete(handlers::delete_review),
        )
        // --- Accounts ---
        // GET /users/{id} is self-or-moderator; DELETE follows the user deletion policy.
        .route(
            "/users/{id}",
            get(handlers::get_user).delete(handlers::delete_user),
        )
}
