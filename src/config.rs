use std::{env, str::FromStr};

const LOCAL_JWT_SECRET: &str = "rentx-local-development-secret-value";
const LOCAL_DATABASE_URL: &str = "sqlite://rentx.db";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors via `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // SQLite connection string, e.g. `sqlite://rentx.db` or `sqlite::memory:`.
    pub db_url: String,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Root directory for uploaded files; served read-only under `/storage`.
    pub storage_dir: String,
    // Upper bound for a single multipart upload request body.
    pub max_upload_bytes: usize,
    // Runtime environment marker. Controls the dev auth bypass and log format.
    pub env: Env,
    // HMAC secret used to sign and verify access tokens.
    pub jwt_secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_days: i64,
    // Account created at startup when no superadmin exists yet.
    pub superadmin: Option<SuperadminSeed>,
}

/// Env
///
/// `Local` enables developer conveniences (`x-user-id` bypass, pretty logs);
/// `Production` demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// SuperadminSeed
///
/// Credentials for the bootstrap superadmin, read from `SUPERADMIN_*`.
#[derive(Clone, Debug, PartialEq)]
pub struct SuperadminSeed {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            storage_dir: env::temp_dir()
                .join("rentx-storage")
                .to_string_lossy()
                .into_owned(),
            max_upload_bytes: 10 * 1024 * 1024,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            access_token_ttl_secs: 2 * 60 * 60,
            refresh_token_ttl_days: 30,
            superadmin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables (after `.env` has been
    /// loaded by `main`).
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` or `JWT_SECRET` is missing in production, or if a
    /// numeric variable cannot be parsed. The service must not start half-configured.
    pub fn load() -> Self {
        let env_kind = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env_kind {
            Env::Production => (
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production."),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").unwrap_or_else(|_| LOCAL_DATABASE_URL.to_string()),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        Self {
            db_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            storage_dir: env::var("STORAGE_DIR").unwrap_or_else(|_| "storage".to_string()),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            env: env_kind,
            jwt_secret,
            access_token_ttl_secs: parse_var("ACCESS_TOKEN_TTL_SECS", 2 * 60 * 60),
            refresh_token_ttl_days: parse_var("REFRESH_TOKEN_TTL_DAYS", 30),
            superadmin: SuperadminSeed::from_env(),
        }
    }
}

impl SuperadminSeed {
    /// All four variables must be present and non-empty, otherwise there is no seed.
    pub fn from_env() -> Option<Self> {
        let read = |key: &str| env::var(key).ok().filter(|value| !value.trim().is_empty());
        Some(Self {
            name: read("SUPERADMIN_NAME")?,
            email: read("SUPERADMIN_EMAIL")?,
            phone: read("SUPERADMIN_PHONE")?,
            password: read("SUPERADMIN_PASSWORD")?,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} has an invalid value '{raw}'.")),
        Err(_) => default,
    }
}
