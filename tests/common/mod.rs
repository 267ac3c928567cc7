#![allow(dead_code)]

use rentx_api::{
    AppConfig, AppState, MockStorageService,
    auth::AuthUser,
    db,
    lifecycle::PostStatus,
    models::{Category, CreatePostRequest, NewUser, Post, User},
    policy::Role,
    repository::{Repository, RepositoryState, SqliteRepository},
    storage::StorageState,
};
use std::sync::Arc;
use uuid::Uuid;

/// A fresh, migrated in-memory database per call.
pub async fn test_repo() -> Arc<SqliteRepository> {
    let pool = db::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    db::migrate(&pool)
        .await
        .expect("Failed to run database migrations");
    Arc::new(SqliteRepository::new(pool))
}

/// A migrated SQLite file in the temp dir behind a multi-connection pool, so
/// concurrent requests really do race.
pub async fn test_repo_file() -> Arc<SqliteRepository> {
    let path = std::env::temp_dir().join(format!("rentx-test-{}.db", Uuid::new_v4()));
    let pool = db::connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("Failed to open SQLite file");
    db::migrate(&pool)
        .await
        .expect("Failed to run database migrations");
    Arc::new(SqliteRepository::new(pool))
}

pub fn state_with(repo: RepositoryState) -> AppState {
    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()) as StorageState,
        config: AppConfig::default(),
    }
}

pub async fn test_state() -> AppState {
    state_with(test_repo().await as RepositoryState)
}

pub async fn seed_user(repo: &dyn Repository, name: &str, role: Role) -> User {
    repo.create_user(NewUser {
        name: name.to_string(),
        email: Some(format!("{name}@rentx.test")),
        phone: None,
        password_hash: None,
        image: String::new(),
        role,
    })
    .await
    .expect("Failed to seed user")
}

pub fn actor(user: &User) -> AuthUser {
    AuthUser::from(user)
}

pub async fn seed_category(repo: &dyn Repository, owner: &User, name: &str) -> Category {
    repo.create_category(name, owner.id)
        .await
        .expect("Failed to seed category")
}

pub fn post_request(category_id: i64, name: &str) -> CreatePostRequest {
    CreatePostRequest {
        category_id,
        name: name.to_string(),
        address: "12 Harbour Road".to_string(),
        description: "Two bedrooms, sea view".to_string(),
        daily_price: 80.0,
        weekly_price: 500.0,
        monthly_price: 1800.0,
        image_urls: vec![
            "/storage/posts/front.png".to_string(),
            "/storage/posts/kitchen.png".to_string(),
        ],
    }
}

pub async fn seed_post(
    repo: &dyn Repository,
    owner: &User,
    category_id: i64,
    name: &str,
    status: PostStatus,
) -> Post {
    repo.create_post(owner.id, post_request(category_id, name), status)
        .await
        .expect("Failed to seed post")
}
