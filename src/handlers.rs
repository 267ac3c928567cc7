use crate::{
    AppState,
    auth::{AuthUser, generate_refresh_token, issue_access_token},
    errors::AppError,
    lifecycle::PostStatus,
    models::{
        AdminDashboardStats, AuthResponse, Category, CategoryRequest, CreateOrderRequest,
        CreatePostRequest, CreateReviewRequest, EmailAuthRequest, MessageResponse, NewUser,
        OAuthRequest, Order, PhoneAuthRequest, Post, PostStatusRequest, RefreshTokenRequest,
        Review, UpdatePostRequest, UpdateReviewRequest, UpdateRoleRequest, UploadResponse, User,
        UserProfile,
    },
    password::{hash_password_off_thread, verify_password_off_thread},
    policy::{
        Role, ensure_can_change_role, ensure_can_delete_user, ensure_can_modify,
        ensure_can_view_user, ensure_moderator,
    },
    repository::PostQuery,
    storage::image_extension,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// PostFilter
///
/// Query parameters for the public listing (GET /posts).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PostFilter {
    /// Only posts in this category.
    pub category_id: Option<i64>,
    /// Case-insensitive match on name, address or description.
    pub search: Option<String>,
}

// --- Helpers ---

fn require_text(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = require_text(email, "email")?.to_lowercase();
    if !email.contains('@') {
        return Err(AppError::bad_request("email is invalid"));
    }
    Ok(email)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_prices(prices: &[Option<f64>]) -> Result<(), AppError> {
    if prices
        .iter()
        .flatten()
        .any(|price| !price.is_finite() || *price < 0.0)
    {
        return Err(AppError::bad_request("prices must be non-negative numbers"));
    }
    Ok(())
}

async fn ensure_category_exists(state: &AppState, category_id: i64) -> Result<(), AppError> {
    match state.repo.get_category(category_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::bad_request(format!(
            "category {category_id} does not exist"
        ))),
    }
}

/// Loads a post that the public may see. Pending and rejected posts read as missing.
async fn load_public_post(state: &AppState, id: i64) -> Result<Post, AppError> {
    state
        .repo
        .get_post(id)
        .await?
        .filter(|post| post.status.is_public())
        .ok_or_else(|| AppError::not_found("Post"))
}

/// issue_session
///
/// Mints an access token and a persisted refresh token for `user`.
async fn issue_session(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let token = issue_access_token(&user, &state.config)?;
    let refresh = state
        .repo
        .save_refresh_token(generate_refresh_token(
            user.id,
            state.config.refresh_token_ttl_days,
        ))
        .await?;

    Ok(AuthResponse {
        message: "Authenticated successfully.".to_string(),
        id: user.id,
        name: user.name,
        image: user.image,
        email: user.email,
        phone: user.phone,
        token,
        refresh_token: refresh.token,
        role: user.role,
    })
}

async fn check_password(user: &User, password: &str) -> Result<(), AppError> {
    let verified = match &user.password_hash {
        Some(hash) => verify_password_off_thread(password.to_string(), hash.clone()).await?,
        None => false,
    };
    if verified {
        Ok(())
    } else {
        Err(AppError::unauthorized("Invalid credentials."))
    }
}

// --- Auth Handlers ---

/// email_auth
///
/// [Public Route] Logs in when the email is known and the password matches,
/// otherwise signs a new `user` up.
#[utoipa::path(
    post,
    path = "/auth-email",
    request_body = EmailAuthRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn email_auth(
    State(state): State<AppState>,
    Json(payload): Json<EmailAuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&payload.email)?;
    let password = require_text(&payload.password, "password")?;

    let user = match state.repo.find_user_by_email(&email).await? {
        Some(user) => {
            check_password(&user, &password).await?;
            user
        }
        None => {
            let name = non_blank(payload.name)
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            let user = state
                .repo
                .create_user(NewUser {
                    name,
                    email: Some(email),
                    phone: non_blank(payload.phone),
                    password_hash: Some(hash_password_off_thread(password.clone()).await?),
                    image: non_blank(payload.image).unwrap_or_default(),
                    role: Role::User,
                })
                .await?;
            tracing::info!(user_id = user.id, "User signed up by email");
            user
        }
    };

    Ok(Json(issue_session(&state, user).await?))
}

/// phone_auth
///
/// [Public Route] The email flow keyed on phone number.
#[utoipa::path(
    post,
    path = "/auth-phone",
    request_body = PhoneAuthRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn phone_auth(
    State(state): State<AppState>,
    Json(payload): Json<PhoneAuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let phone = require_text(&payload.phone, "phone")?;
    let password = require_text(&payload.password, "password")?;

    let user = match state.repo.find_user_by_phone(&phone).await? {
        Some(user) => {
            check_password(&user, &password).await?;
            user
        }
        None => {
            let email = match non_blank(payload.email) {
                Some(email) => Some(normalize_email(&email)?),
                None => None,
            };
            let user = state
                .repo
                .create_user(NewUser {
                    name: non_blank(payload.name).unwrap_or_else(|| phone.clone()),
                    email,
                    phone: Some(phone),
                    password_hash: Some(hash_password_off_thread(password.clone()).await?),
                    image: non_blank(payload.image).unwrap_or_default(),
                    role: Role::User,
                })
                .await?;
            tracing::info!(user_id = user.id, "User signed up by phone");
            user
        }
    };

    Ok(Json(issue_session(&state, user).await?))
}

/// oauth_auth
///
/// [Public Route] Find-or-create by an email the identity provider has already
/// verified. Accounts created here have no password.
#[utoipa::path(
    post,
    path = "/auth-oauth",
    request_body = OAuthRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Email is required")
    )
)]
pub async fn oauth_auth(
    State(state): State<AppState>,
    Json(payload): Json<OAuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&payload.email)?;

    let user = match state.repo.find_user_by_email(&email).await? {
        Some(user) => user,
        None => {
            let name = non_blank(payload.name)
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            let user = state
                .repo
                .create_user(NewUser {
                    name,
                    email: Some(email),
                    phone: None,
                    password_hash: None,
                    image: non_blank(payload.image).unwrap_or_default(),
                    role: Role::User,
                })
                .await?;
            tracing::info!(user_id = user.id, "User signed up by OAuth");
            user
        }
    };

    Ok(Json(issue_session(&state, user).await?))
}

/// refresh_token
///
/// [Public Route] Exchanges a live refresh token for a new access token. The
/// refresh token itself is returned unchanged.
#[utoipa::path(
    post,
    path = "/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let raw = require_text(&payload.refresh_token, "refreshToken")?;

    let stored = state
        .repo
        .find_refresh_token(&raw)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid or expired refresh token"))?;

    if stored.is_expired(Utc::now()) {
        state.repo.delete_refresh_token(&stored.token).await?;
        return Err(AppError::unauthorized("Invalid or expired refresh token"));
    }

    let user = state
        .repo
        .get_user(stored.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let token = issue_access_token(&user, &state.config)?;

    Ok(Json(AuthResponse {
        message: "Authenticated successfully.".to_string(),
        id: user.id,
        name: user.name,
        image: user.image,
        email: user.email,
        phone: user.phone,
        token,
        refresh_token: stored.token,
        role: user.role,
    }))
}

/// logout
///
/// [Public Route] Revokes a refresh token. Unknown tokens are not an error.
#[utoipa::path(
    post,
    path = "/logout",
    request_body = RefreshTokenRequest,
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let raw = require_text(&payload.refresh_token, "refreshToken")?;
    state.repo.delete_refresh_token(&raw).await?;
    Ok(Json(MessageResponse {
        message: "Logged out.".to_string(),
    }))
}

// --- Category Handlers ---

#[utoipa::path(
    get,
    path = "/category",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.repo.list_categories().await?))
}

/// create_category
///
/// [Authenticated Route] The creator becomes the category's owner.
#[utoipa::path(
    post,
    path = "/category",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Name is required")
    )
)]
pub async fn create_category(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let name = require_text(&payload.name, "name")?;
    let category = state.repo.create_category(&name, user_id).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/category/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_category(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let name = require_text(&payload.name, "name")?;
    let category = state
        .repo
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    ensure_can_modify(&actor, category.user_id)?;

    state
        .repo
        .update_category(id, &name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Category"))
}

/// delete_category
///
/// [Authenticated Route] Posts in the category are removed with it.
#[utoipa::path(
    delete,
    path = "/category/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let category = state
        .repo
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    ensure_can_modify(&actor, category.user_id)?;

    if state.repo.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Category"))
    }
}

// --- Upload Handler ---

/// upload_post_images
///
/// [Authenticated Route] Accepts one or more multipart `files` parts and stores
/// each under a fresh UUID name. The returned URLs go into `imageUrls` when the
/// post is created or updated.
#[utoipa::path(
    post,
    path = "/upload/post-image",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "One or more image parts named `files`"
    ),
    responses(
        (status = 200, description = "Stored", body = UploadResponse),
        (status = 400, description = "No files, or not an image")
    )
)]
pub async fn upload_post_images(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    // Every part is read and checked before anything is written, so a bad
    // part leaves no files behind.
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }

        let extension = image_extension(field.file_name(), field.content_type())
            .ok_or_else(|| AppError::bad_request("only jpg, jpeg, png, gif and webp images are accepted"))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("failed to read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(AppError::bad_request("uploaded file is empty"));
        }

        uploads.push((format!("posts/{}.{}", Uuid::new_v4(), extension), bytes));
    }

    if uploads.is_empty() {
        return Err(AppError::bad_request("no files uploaded"));
    }

    let mut urls = Vec::with_capacity(uploads.len());
    for (index, (key, bytes)) in uploads.iter().enumerate() {
        match state.storage.put_object(key, bytes).await {
            Ok(url) => urls.push(url),
            Err(err) => {
                for (stored, _) in &uploads[..index] {
                    if let Err(cleanup) = state.storage.delete_object(stored).await {
                        tracing::warn!(key = %stored, error = %cleanup, "failed to remove partial upload");
                    }
                }
                return Err(err);
            }
        }
    }

    tracing::info!(user_id, count = urls.len(), "Post images uploaded");
    Ok(Json(UploadResponse { urls }))
}

// --- Post Handlers ---

/// create_post
///
/// [Authenticated Route] Posts by admins and superadmins are approved at once;
/// everyone else's wait in the moderation queue.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Json(mut payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    payload.name = require_text(&payload.name, "name")?;
    payload.address = require_text(&payload.address, "address")?;
    payload.description = payload.description.trim().to_string();
    validate_prices(&[
        Some(payload.daily_price),
        Some(payload.weekly_price),
        Some(payload.monthly_price),
    ])?;
    ensure_category_exists(&state, payload.category_id).await?;

    let status = PostStatus::initial_for(actor.role);
    let post = state.repo.create_post(actor.id, payload, status).await?;

    tracing::info!(post_id = post.id, user_id = actor.id, status = %post.status, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Owner or moderator. The status is never changed here;
/// moderation goes through PUT /posts/{id}/status.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    ensure_can_modify(&actor, Some(post.user_id))?;

    if let Some(name) = payload.name.as_deref() {
        payload.name = Some(require_text(name, "name")?);
    }
    if let Some(address) = payload.address.as_deref() {
        payload.address = Some(require_text(address, "address")?);
    }
    if let Some(description) = payload.description.as_deref() {
        payload.description = Some(description.trim().to_string());
    }
    validate_prices(&[payload.daily_price, payload.weekly_price, payload.monthly_price])?;
    if let Some(category_id) = payload.category_id {
        ensure_category_exists(&state, category_id).await?;
    }

    state
        .repo
        .update_post(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Post"))
}

#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let post = state
        .repo
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    ensure_can_modify(&actor, Some(post.user_id))?;

    if state.repo.delete_post(id).await? {
        tracing::info!(post_id = id, actor_id = actor.id, "Post deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Post"))
    }
}

/// list_posts
///
/// [Public Route] Approved posts only, whatever the filter says.
#[utoipa::path(
    get,
    path = "/posts",
    params(PostFilter),
    responses((status = 200, description = "Approved posts", body = [Post]))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = state
        .repo
        .list_posts(PostQuery {
            status: Some(PostStatus::Approved),
            category_id: filter.category_id,
            user_id: None,
            search: filter.search,
        })
        .await?;
    Ok(Json(posts))
}

/// get_post
///
/// [Public Route] A pending or rejected post is reported as missing.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = Post),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(load_public_post(&state, id).await?))
}

/// list_pending_posts
///
/// [Admin Route] The moderation queue, newest first.
#[utoipa::path(
    get,
    path = "/posts/pending",
    responses(
        (status = 200, description = "Pending posts", body = [Post]),
        (status = 403, description = "Moderator role required")
    )
)]
pub async fn list_pending_posts(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, AppError> {
    ensure_moderator(&actor)?;
    let posts = state
        .repo
        .list_posts(PostQuery {
            status: Some(PostStatus::Pending),
            ..PostQuery::default()
        })
        .await?;
    Ok(Json(posts))
}

/// review_post
///
/// [Admin Route] Approves or rejects a pending post. Each post is decided once;
/// a second decision is a 409.
#[utoipa::path(
    put,
    path = "/posts/{id}/status",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = PostStatusRequest,
    responses(
        (status = 200, description = "Decided", body = Post),
        (status = 400, description = "Status must be approved or rejected"),
        (status = 403, description = "Moderator role required"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn review_post(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PostStatusRequest>,
) -> Result<Json<Post>, AppError> {
    ensure_moderator(&actor)?;

    let target: PostStatus = payload
        .status
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| AppError::bad_request("Status must be 'approved' or 'rejected'"))?;

    let post = state.repo.review_post(id, target).await?;

    tracing::info!(post_id = id, moderator_id = actor.id, status = %post.status, "Post reviewed");
    Ok(Json(post))
}

// --- Profile Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(UserProfile::from(user)))
}

/// get_my_posts
///
/// [Authenticated Route] Everything the caller has posted, including posts still
/// pending and posts that were rejected.
#[utoipa::path(
    get,
    path = "/me/posts",
    responses((status = 200, description = "My posts", body = [Post]))
)]
pub async fn get_my_posts(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = state
        .repo
        .list_posts(PostQuery {
            user_id: Some(id),
            ..PostQuery::default()
        })
        .await?;
    Ok(Json(posts))
}

// --- Order Handlers ---

#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Created", body = Order),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_order(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let post = load_public_post(&state, payload.post_id).await?;
    let order = state.repo.create_order(user_id, post.id).await?;

    tracing::info!(order_id = order.id, post_id = post.id, user_id, "Order placed");
    Ok((StatusCode::CREATED, Json(order)))
}

/// list_orders
///
/// [Authenticated Route] Moderators see every order, everyone else their own.
#[utoipa::path(
    get,
    path = "/orders",
    responses((status = 200, description = "Orders", body = [Order]))
)]
pub async fn list_orders(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, AppError> {
    let owner = if actor.role.is_moderator() {
        None
    } else {
        Some(actor.id)
    };
    Ok(Json(state.repo.list_orders(owner).await?))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Found", body = Order),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_order(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .repo
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    ensure_can_modify(&actor, Some(order.user_id))?;
    Ok(Json(order))
}

#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_order(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let order = state
        .repo
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    ensure_can_modify(&actor, Some(order.user_id))?;

    if state.repo.delete_order(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Order"))
    }
}

// --- Review Handlers ---

#[utoipa::path(
    post,
    path = "/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Review text is required"),
        (status = 404, description = "Post not found")
    )
)]
pub async fn create_review(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let text = require_text(&payload.review, "review")?;
    let post = load_public_post(&state, payload.post_id).await?;
    let review = state.repo.create_review(user_id, post.id, &text).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// list_post_reviews
///
/// [Public Route] Reviews of an approved post.
#[utoipa::path(
    get,
    path = "/posts/{id}/reviews",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Reviews", body = [Review]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_post_reviews(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Review>>, AppError> {
    let post = load_public_post(&state, post_id).await?;
    Ok(Json(state.repo.list_reviews(post.id).await?))
}

#[utoipa::path(
    put,
    path = "/reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Updated", body = Review),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_review(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    let text = require_text(&payload.review, "review")?;
    let review = state
        .repo
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    ensure_can_modify(&actor, Some(review.user_id))?;

    state
        .repo
        .update_review(id, &text)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Review"))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    params(("id" = i64, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_review(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let review = state
        .repo
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    ensure_can_modify(&actor, Some(review.user_id))?;

    if state.repo.delete_review(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Review"))
    }
}

// --- User Management Handlers ---

/// list_users
///
/// [Admin Route] Every account, without credentials.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users", body = [UserProfile]),
        (status = 403, description = "Moderator role required")
    )
)]
pub async fn list_users(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    ensure_moderator(&actor)?;
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, AppError> {
    ensure_can_view_user(&actor, id)?;
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(UserProfile::from(user)))
}

/// delete_user
///
/// [Authenticated Route] Self-service account deletion, or removal by a
/// moderator. Admins cannot remove superadmins, and the last superadmin
/// cannot be removed at all.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Last superadmin")
    )
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let target = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    ensure_can_delete_user(&actor, &target)?;

    // The repository refuses to remove the last superadmin.
    if state.repo.delete_user(id).await? {
        tracing::info!(user_id = id, actor_id = actor.id, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("User"))
    }
}

/// update_user_role
///
/// [Admin Route] Superadmin only: promotes or demotes another account.
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 403, description = "Superadmin role required"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Last superadmin")
    )
)]
pub async fn update_user_role(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserProfile>, AppError> {
    ensure_moderator(&actor)?;
    let target = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    ensure_can_change_role(&actor, &target)?;

    let updated = state
        .repo
        .set_user_role(id, payload.role)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    tracing::info!(
        user_id = id,
        actor_id = actor.id,
        from = %target.role,
        to = %updated.role,
        "User role changed"
    );
    Ok(Json(UserProfile::from(updated)))
}

// --- Dashboard ---

/// get_admin_stats
///
/// [Admin Route] Row counts for the moderation dashboard.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Moderator role required")
    )
)]
pub async fn get_admin_stats(
    actor: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, AppError> {
    ensure_moderator(&actor)?;
    Ok(Json(state.repo.get_stats().await?))
}
