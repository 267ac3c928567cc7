use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{lifecycle::PostStatus, policy::Role};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The canonical account row from the `users` table. Never serialized directly:
/// it carries the password hash. Responses go through `UserProfile`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub name: String,
    // Either identifier may be absent: OAuth accounts have no phone and
    // phone accounts may have no email.
    pub email: Option<String>,
    pub phone: Option<String>,
    // Argon2 PHC string. `None` for OAuth-only accounts.
    pub password_hash: Option<String>,
    pub image: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for `Repository::create_user`. The password is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub image: String,
    pub role: Role,
}

/// UserProfile
///
/// Public view of a `User` (GET /me, GET /users).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image: String,
    pub role: Role,
    #[serde(rename = "dateTime")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            image: user.image,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// RefreshToken
///
/// Long-lived opaque token stored in `refresh_tokens`, exchanged for new access tokens.
#[derive(Debug, Clone, FromRow, Default)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Category
///
/// A listing category. The creator is kept for ownership checks but never
/// exposed over the API.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: i64,
    #[serde(skip)]
    pub user_id: Option<i64>,
    pub name: String,
    #[serde(rename = "dateTime")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A rental listing from the `posts` table. `image_urls` lives in `post_images`
/// and is attached by the repository after the main row is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub name: String,
    pub address: String,
    pub description: String,
    pub daily_price: f64,
    pub weekly_price: f64,
    pub monthly_price: f64,
    #[sqlx(skip)]
    pub image_urls: Vec<String>,
    #[sqlx(try_from = "String")]
    pub status: PostStatus,
    #[serde(rename = "dateTime")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Order
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    #[serde(rename = "dateTime")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Review
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub review: String,
    #[serde(rename = "dateTime")]
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// EmailAuthRequest
///
/// POST /auth-email. Logs in when the email exists, signs up otherwise.
/// `name`, `phone` and `image` are only used on signup.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EmailAuthRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// PhoneAuthRequest
///
/// POST /auth-phone. Same login-or-signup flow as email, keyed on phone.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PhoneAuthRequest {
    pub phone: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// OAuthRequest
///
/// POST /auth-oauth. The identity provider has already verified the email.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OAuthRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// RefreshTokenRequest
///
/// POST /refresh-token and POST /logout.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// CategoryRequest
///
/// Body for creating or renaming a category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryRequest {
    pub name: String,
}

/// CreatePostRequest
///
/// POST /posts. `image_urls` are the URLs returned by /upload/post-image, in
/// display order. The status is never client-controlled.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    pub category_id: i64,
    pub name: String,
    pub address: String,
    pub description: String,
    #[serde(default)]
    pub daily_price: f64,
    #[serde(default)]
    pub weekly_price: f64,
    #[serde(default)]
    pub monthly_price: f64,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// UpdatePostRequest
///
/// Partial update payload (PUT /posts/{id}). Absent fields are left untouched;
/// a present `image_urls` replaces the whole image set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

/// PostStatusRequest
///
/// PUT /posts/{id}/status. Accepted values: "approved" or "rejected".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostStatusRequest {
    #[schema(example = "approved")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateOrderRequest {
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateReviewRequest {
    pub post_id: i64,
    pub review: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateReviewRequest {
    pub review: String,
}

/// UpdateRoleRequest
///
/// PUT /users/{id}/role (superadmin only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

// --- Output Schemas ---

/// AuthResponse
///
/// Returned by every successful authentication flow. `token` is the short-lived
/// JWT, `refresh_token` the long-lived opaque token.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthResponse {
    pub message: String,
    pub id: i64,
    pub name: String,
    pub image: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub token: String,
    pub refresh_token: String,
    pub role: Role,
}

/// UploadResponse
///
/// Public URLs of freshly stored images, in upload order.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UploadResponse {
    pub urls: Vec<String>,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// AdminDashboardStats
///
/// Output schema for the moderation dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub total_categories: i64,
    pub total_posts: i64,
    /// Posts still waiting for a moderation decision.
    pub pending_posts: i64,
    pub total_orders: i64,
    pub total_reviews: i64,
}
