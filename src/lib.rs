use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain rules: who may act, and how a post moves through moderation.
pub mod lifecycle;
pub mod policy;

// Application services and components.
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod storage;

// Routing segregated by required access (public, authenticated, moderator).
pub mod routes;
use auth::AuthUser;
use errors::AppError;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{RepositoryState, SqliteRepository};
pub use storage::{LocalDiskStorage, MockStorageService, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::email_auth, handlers::phone_auth, handlers::oauth_auth,
        handlers::refresh_token, handlers::logout,
        handlers::list_categories, handlers::create_category, handlers::update_category,
        handlers::delete_category, handlers::upload_post_images,
        handlers::create_post, handlers::update_post, handlers::delete_post,
        handlers::list_posts, handlers::get_post, handlers::list_pending_posts,
        handlers::review_post, handlers::get_me, handlers::get_my_posts,
        handlers::create_order, handlers::list_orders, handlers::get_order, handlers::delete_order,
        handlers::create_review, handlers::list_post_reviews, handlers::update_review,
        handlers::delete_review, handlers::list_users, handlers::get_user, handlers::delete_user,
        handlers::update_user_role, handlers::get_admin_stats
    ),
    components(
        schemas(
            models::UserProfile, models::Category, models::Post, models::Order, models::Review,
            models::EmailAuthRequest, models::PhoneAuthRequest, models::OAuthRequest,
            models::RefreshTokenRequest, models::CategoryRequest, models::CreatePostRequest,
            models::UpdatePostRequest, models::PostStatusRequest, models::CreateOrderRequest,
            models::CreateReviewRequest, models::UpdateReviewRequest, models::UpdateRoleRequest,
            models::AuthResponse, models::UploadResponse, models::MessageResponse,
            models::AdminDashboardStats, policy::Role, lifecycle::PostStatus,
        )
    ),
    tags(
        (name = "rentx", description = "RentX rental marketplace API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container of shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer over the SQLite pool.
    pub repo: RepositoryState,
    /// Where uploaded post images are written.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted.
pub async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// require_moderator
///
/// Authenticates like `auth_middleware`, then rejects anyone below `admin` with 403.
pub async fn require_moderator(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    policy::ensure_moderator(&auth_user)?;
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routing tree, applies per-group access middleware and the
/// global observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Uploaded images, read-only.
        .nest_service("/storage", ServeDir::new(&state.config.storage_dir))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_moderator,
            )),
        )
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span carrying method, URI and the `x-request-id` set
/// by `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
