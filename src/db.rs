use std::{str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::{
    config::{AppConfig, Env},
    errors::AppError,
    models::NewUser,
    password::hash_password_off_thread,
    policy::Role,
    repository::Repository,
};

/// connect
///
/// Opens the SQLite pool with foreign keys enforced. An in-memory database lives
/// only as long as its connection, so it gets a single connection that is never
/// recycled.
pub async fn connect(db_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = db_url.contains(":memory:") || db_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    Ok(pool_options.connect_with(options).await?)
}

/// migrate
///
/// Applies every pending migration under `./migrations`.
pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// ensure_superadmin
///
/// Makes sure at least one superadmin exists. When none does, the account from
/// `SUPERADMIN_*` is created. Without a seed, production refuses to start and
/// local mode only warns.
pub async fn ensure_superadmin(repo: &dyn Repository, config: &AppConfig) -> Result<(), AppError> {
    if repo.count_superadmins().await? > 0 {
        return Ok(());
    }

    let Some(seed) = &config.superadmin else {
        if config.env == Env::Production {
            return Err(AppError::Config(
                "no superadmin exists and SUPERADMIN_* is not set".to_string(),
            ));
        }
        tracing::warn!("No superadmin account exists and SUPERADMIN_* is not set.");
        return Ok(());
    };

    let email = seed.email.trim().to_lowercase();
    let phone = seed.phone.trim().to_string();

    // The seed identity may already exist as an ordinary account.
    let existing = match repo.find_user_by_email(&email).await? {
        Some(user) => Some(user),
        None => repo.find_user_by_phone(&phone).await?,
    };

    let user = match existing {
        Some(user) => repo
            .set_user_role(user.id, Role::Superadmin)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?,
        None => {
            repo.create_user(NewUser {
                name: seed.name.clone(),
                email: Some(email),
                phone: Some(phone),
                password_hash: Some(hash_password_off_thread(seed.password.clone()).await?),
                image: String::new(),
                role: Role::Superadmin,
            })
            .await?
        }
    };

    tracing::info!(user_id = user.id, "Superadmin account ensured");
    Ok(())
}
