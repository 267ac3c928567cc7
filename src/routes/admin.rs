use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Moderation and account management. `create_router` layers this router with
/// authentication and the moderator check, so a plain `user` is turned away
/// before any handler runs. Handlers repeat the role check, and the role change
/// endpoint narrows it further to superadmins.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /posts/pending
        // The moderation queue.
        .route("/posts/pending", get(handlers::list_pending_posts))
        // PUT /posts/{id}/status
        // Approve or reject a pending post. A post is decided exactly once.
        .route("/posts/{id}/status", put(handlers::review_post))
        // GET /users
        .route("/users", get(handlers::list_users))
        // PUT /users/{id}/role
        .route("/users/{id}/role", put(handlers::update_user_role))
        // GET /admin/stats
        // Dashboard counters.
        .route("/admin/stats", get(handlers::get_admin_stats))
}
