use rentx_api::{
    AppState,
    config::{AppConfig, Env},
    create_router, db,
    repository::{RepositoryState, SqliteRepository},
    storage::{LocalDiskStorage, StorageService, StorageState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, opens and migrates the database, seeds
/// the superadmin, prepares storage and serves the router.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise debug for this crate.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rentx_api=debug,tower_http=info,axum=trace,sqlx=warn".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = db::connect(&config.db_url)
        .await
        .expect("FATAL: Failed to open SQLite database. Check DATABASE_URL.");
    db::migrate(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;

    db::ensure_superadmin(repo.as_ref(), &config)
        .await
        .expect("FATAL: Failed to ensure a superadmin account.");

    // 4. Storage
    let disk = LocalDiskStorage::new(&config.storage_dir);
    disk.ensure_ready()
        .await
        .expect("FATAL: Failed to create STORAGE_DIR.");
    let storage = Arc::new(disk) as StorageState;

    // 5. State, router, server
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        config,
    };
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
