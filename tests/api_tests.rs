use rentx_api::{
    AppConfig, AppState, MockStorageService, create_router, db,
    models::{AuthResponse, Category, NewUser, Post},
    password::hash_password,
    policy::Role,
    repository::{Repository, RepositoryState, SqliteRepository},
    storage::StorageState,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
}

async fn spawn_app() -> TestApp {
    let pool = db::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    db::migrate(&pool).await.expect("Failed to migrate");

    let repo = Arc::new(SqliteRepository::new(pool)) as RepositoryState;
    let state = AppState {
        repo: repo.clone(),
        storage: Arc::new(MockStorageService::new()) as StorageState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

async fn sign_in(client: &reqwest::Client, app: &TestApp, email: &str) -> AuthResponse {
    let response = client
        .post(format!("{}/auth-email", app.address))
        .json(&json!({ "email": email, "password": "hunter2", "name": "Test" }))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_listing_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let owner = sign_in(&client, &app, "owner@example.com").await;
    assert_eq!(owner.role, Role::User);

    app.repo
        .create_user(NewUser {
            name: "Mod".to_string(),
            email: Some("mod@example.com".to_string()),
            password_hash: Some(hash_password("hunter2").unwrap()),
            role: Role::Admin,
            ..Default::default()
        })
        .await
        .unwrap();
    let admin = sign_in(&client, &app, "mod@example.com").await;
    assert_eq!(admin.role, Role::Admin);

    // 1. Category
    let category: Category = client
        .post(format!("{}/category", app.address))
        .bearer_auth(&owner.token)
        .json(&json!({ "name": "Cabins" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // 2. Post starts pending
    let response = client
        .post(format!("{}/posts", app.address))
        .bearer_auth(&owner.token)
        .json(&json!({
            "categoryId": category.id,
            "name": "Lakeside Cabin",
            "address": "1 Shore Lane",
            "description": "Wood stove",
            "dailyPrice": 120.0,
            "weeklyPrice": 700.0,
            "monthlyPrice": 2400.0,
            "imageUrls": ["/storage/posts/cabin.png"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let post: Post = response.json().await.unwrap();
    assert_eq!(post.status, rentx_api::lifecycle::PostStatus::Pending);

    let public: Vec<Post> = client
        .get(format!("{}/posts", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(public.is_empty());

    // 3. Approve
    let response = client
        .put(format!("{}/posts/{}/status", app.address, post.id))
        .bearer_auth(&admin.token)
        .json(&json!({ "status": "approved" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // 4. Publicly visible, owner can still see it under /me/posts
    let public: Vec<Post> = client
        .get(format!("{}/posts", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].image_urls, vec!["/storage/posts/cabin.png"]);

    let mine: Vec<Post> = client
        .get(format!("{}/me/posts", app.address))
        .bearer_auth(&owner.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);

    // 5. Refresh keeps the session alive
    let refreshed = client
        .post(format!("{}/refresh-token", app.address))
        .json(&json!({ "refreshToken": owner.refresh_token }))
        .send()
        .await
        .unwrap();
    assert!(refreshed.status().is_success());
}
