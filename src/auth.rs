use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    errors::AppError,
    models::{RefreshToken, User},
    policy::Role,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the HS256 access token. `role` is informational for clients; the
/// extractor always re-reads the role from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's primary key.
    pub sub: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    /// Expiration time (seconds since epoch).
    pub exp: usize,
    /// Issued at (seconds since epoch).
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request: the actor every policy
/// check is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

/// issue_access_token
///
/// Mints a signed access token for `user` valid for `access_token_ttl_secs`.
pub fn issue_access_token(user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        phone: user.phone.clone(),
        role: user.role,
        iat: now,
        exp: now + config.access_token_ttl_secs as usize,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    Ok(encode(&Header::default(), &claims, &key)?)
}

/// decode_access_token
///
/// Signature and expiry are both checked; any failure is a 401.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected access token");
            AppError::unauthorized("invalid token")
        })
}

/// generate_refresh_token
///
/// 32 random bytes, URL-safe base64. Not yet persisted: `id` and `created_at`
/// are filled in by `Repository::save_refresh_token`.
pub fn generate_refresh_token(user_id: i64, ttl_days: i64) -> RefreshToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    let now = Utc::now();
    RefreshToken {
        id: 0,
        user_id,
        token: Base64UrlUnpadded::encode_string(&bytes),
        expires_at: now + Duration::days(ttl_days),
        created_at: now,
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user
///    authenticates as that user.
/// 2. Otherwise a `Bearer` access token is required and validated.
/// 3. The user is reloaded from the database so deletions and role changes take
///    effect immediately, regardless of what the token claims.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.parse::<i64>().ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(AuthUser::from(&user));
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing token"))?
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("missing token"))?;

        let claims = decode_access_token(token, &config.jwt_secret)?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;

        Ok(AuthUser::from(&user))
    }
}
