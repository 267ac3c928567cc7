use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    errors::AppError,
    lifecycle::PostStatus,
    models::{
        AdminDashboardStats, Category, CreatePostRequest, NewUser, Order, Post, RefreshToken,
        Review, UpdatePostRequest, User,
    },
    policy::Role,
};

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, image, role, created_at";
const POST_COLUMNS: &str = "id, user_id, category_id, name, address, description, \
     daily_price, weekly_price, monthly_price, status, created_at, updated_at";

// True unless the targeted row is the only superadmin left.
const KEEPS_A_SUPERADMIN: &str = "(role <> 'superadmin' \
     OR (SELECT COUNT(*) FROM users WHERE role = 'superadmin') > 1)";

/// PostQuery
///
/// Filters for `Repository::list_posts`. Every `None` field is unconstrained.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub status: Option<PostStatus>,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    /// Case-insensitive substring match over name, address and description.
    pub search: Option<String>,
}

/// Repository Trait
///
/// The contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so authorization decisions stay out of SQL: the
/// repository reads and writes rows, the policy module decides who may.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError>;
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    // Both refuse, with `Conflict`, to leave the system without a superadmin.
    async fn set_user_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError>;
    async fn delete_user(&self, id: i64) -> Result<bool, AppError>;
    async fn count_superadmins(&self) -> Result<i64, AppError>;

    // --- Refresh tokens ---
    async fn save_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken, AppError>;
    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError>;
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AppError>;

    // --- Categories ---
    async fn create_category(&self, name: &str, user_id: i64) -> Result<Category, AppError>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError>;
    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;
    async fn update_category(&self, id: i64, name: &str) -> Result<Option<Category>, AppError>;
    async fn delete_category(&self, id: i64) -> Result<bool, AppError>;

    // --- Posts ---
    // Inserts the post and its images in one transaction.
    async fn create_post(
        &self,
        user_id: i64,
        req: CreatePostRequest,
        status: PostStatus,
    ) -> Result<Post, AppError>;
    // Any status; visibility is the caller's decision.
    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError>;
    async fn list_posts(&self, query: PostQuery) -> Result<Vec<Post>, AppError>;
    // Partial update; never touches `status`.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError>;
    async fn delete_post(&self, id: i64) -> Result<bool, AppError>;
    // Applies one moderation decision under the lifecycle rules, atomically.
    async fn review_post(&self, id: i64, target: PostStatus) -> Result<Post, AppError>;

    // --- Orders ---
    async fn create_order(&self, user_id: i64, post_id: i64) -> Result<Order, AppError>;
    async fn get_order(&self, id: i64) -> Result<Option<Order>, AppError>;
    // `None` lists every order.
    async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>, AppError>;
    async fn delete_order(&self, id: i64) -> Result<bool, AppError>;

    // --- Reviews ---
    async fn create_review(&self, user_id: i64, post_id: i64, text: &str)
    -> Result<Review, AppError>;
    async fn get_review(&self, id: i64) -> Result<Option<Review>, AppError>;
    async fn list_reviews(&self, post_id: i64) -> Result<Vec<Review>, AppError>;
    async fn update_review(&self, id: i64, text: &str) -> Result<Option<Review>, AppError>;
    async fn delete_review(&self, id: i64) -> Result<bool, AppError>;

    // --- Dashboard ---
    async fn get_stats(&self) -> Result<AdminDashboardStats, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// SqliteRepository
///
/// The `Repository` implementation backed by a SQLite connection pool.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// attach_images
    ///
    /// Loads the images of every post in `posts` with a single `IN (...)` query
    /// and fills `image_urls` in `position` order.
    async fn attach_images(&self, posts: &mut [Post]) -> Result<(), AppError> {
        if posts.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT post_id, image_url FROM post_images WHERE post_id IN (");
        let mut ids = builder.separated(", ");
        for post in posts.iter() {
            ids.push_bind(post.id);
        }
        ids.push_unseparated(") ORDER BY post_id, position ASC, id ASC");

        let rows: Vec<(i64, String)> = builder.build_query_as().fetch_all(&self.pool).await?;

        let mut by_post: HashMap<i64, Vec<String>> = HashMap::new();
        for (post_id, url) in rows {
            by_post.entry(post_id).or_default().push(url);
        }
        for post in posts.iter_mut() {
            post.image_urls = by_post.remove(&post.id).unwrap_or_default();
        }
        Ok(())
    }
}

/// insert_images
///
/// Blank URLs are skipped; positions are dense and follow the input order.
async fn insert_images(
    conn: &mut SqliteConnection,
    post_id: i64,
    urls: &[String],
) -> Result<(), sqlx::Error> {
    let urls = urls.iter().filter(|url| !url.trim().is_empty());
    for (position, url) in urls.enumerate() {
        sqlx::query("INSERT INTO post_images (post_id, image_url, position) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(url)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// escape_like
///
/// Makes `%`, `_` and the escape character itself match literally in a
/// `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Repository for SqliteRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, AppError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?"))
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// A duplicate email or phone fails with a UNIQUE violation, which `AppError`
    /// renders as 409.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let id = sqlx::query(
            "INSERT INTO users (name, email, phone, password_hash, image, role) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.image)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// set_user_role
    ///
    /// Demoting the last superadmin is refused inside the same statement, so
    /// two superadmins demoting each other cannot both succeed.
    async fn set_user_role(&self, id: i64, role: Role) -> Result<Option<User>, AppError> {
        let result = sqlx::query(&format!(
            "UPDATE users SET role = ? WHERE id = ? AND (? = 'superadmin' OR {KEEPS_A_SUPERADMIN})"
        ))
        .bind(role.as_str())
        .bind(id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_user(id).await? {
                Some(_) => Err(AppError::Conflict(
                    "cannot demote the last superadmin".to_string(),
                )),
                None => Ok(None),
            };
        }
        self.get_user(id).await
    }

    /// delete_user
    ///
    /// The last superadmin is never deleted; the check and the delete are one
    /// statement.
    async fn delete_user(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(&format!("DELETE FROM users WHERE id = ? AND {KEEPS_A_SUPERADMIN}"))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.get_user(id).await? {
            Some(_) => Err(AppError::Conflict(
                "cannot delete the last superadmin".to_string(),
            )),
            None => Ok(false),
        }
    }

    async fn count_superadmins(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(Role::Superadmin.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- REFRESH TOKENS ---

    async fn save_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken, AppError> {
        let id = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(RefreshToken { id, ..token })
    }

    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, AppError> {
        let row = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token, expires_at, created_at FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CATEGORIES ---

    async fn create_category(&self, name: &str, user_id: i64) -> Result<Category, AppError> {
        let id = sqlx::query("INSERT INTO categories (name, user_id) VALUES (?, ?)")
            .bind(name)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        self.get_category(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, user_id, name, created_at FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, user_id, name, created_at FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn update_category(&self, id: i64, name: &str) -> Result<Option<Category>, AppError> {
        let result = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_category(id).await
    }

    async fn delete_category(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- POSTS ---

    async fn create_post(
        &self,
        user_id: i64,
        req: CreatePostRequest,
        status: PostStatus,
    ) -> Result<Post, AppError> {
        let mut tx = self.pool.begin().await?;

        let post_id = sqlx::query(
            r#"
            INSERT INTO posts
                (user_id, category_id, name, address, description,
                 daily_price, weekly_price, monthly_price, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(req.category_id)
        .bind(&req.name)
        .bind(&req.address)
        .bind(&req.description)
        .bind(req.daily_price)
        .bind(req.weekly_price)
        .bind(req.monthly_price)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_images(&mut tx, post_id, &req.image_urls).await?;
        tx.commit().await?;

        self.get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match post {
            Some(post) => {
                let mut posts = [post];
                self.attach_images(&mut posts).await?;
                let [post] = posts;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    /// list_posts
    ///
    /// Builds the WHERE clause with `QueryBuilder` so every filter value is bound,
    /// never interpolated. Newest first.
    async fn list_posts(&self, query: PostQuery) -> Result<Vec<Post>, AppError> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE 1 = 1"));

        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(category_id) = query.category_id {
            builder.push(" AND category_id = ");
            builder.push_bind(category_id);
        }
        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ");
            builder.push_bind(user_id);
        }
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            // SQLite LIKE is case-insensitive for ASCII.
            let pattern = format!("%{}%", escape_like(search.trim()));
            builder.push(" AND (name LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR address LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR description LIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }

        builder.push(" ORDER BY id DESC");

        let mut posts = builder.build_query_as::<Post>().fetch_all(&self.pool).await?;
        self.attach_images(&mut posts).await?;
        Ok(posts)
    }

    /// update_post
    ///
    /// `COALESCE` keeps columns whose field is `None`. When `image_urls` is present
    /// the image set is replaced inside the same transaction.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET category_id = COALESCE(?, category_id),
                name = COALESCE(?, name),
                address = COALESCE(?, address),
                description = COALESCE(?, description),
                daily_price = COALESCE(?, daily_price),
                weekly_price = COALESCE(?, weekly_price),
                monthly_price = COALESCE(?, monthly_price),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.category_id)
        .bind(&req.name)
        .bind(&req.address)
        .bind(&req.description)
        .bind(req.daily_price)
        .bind(req.weekly_price)
        .bind(req.monthly_price)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(urls) = &req.image_urls {
            sqlx::query("DELETE FROM post_images WHERE post_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_images(&mut tx, id, urls).await?;
        }

        tx.commit().await?;
        self.get_post(id).await
    }

    async fn delete_post(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// review_post
    ///
    /// The decision is a single conditional `UPDATE ... AND status = 'pending'`,
    /// so SQLite's write lock picks exactly one winner among concurrent
    /// moderators. When no row changes, the current status decides between
    /// 404 and the lifecycle conflict.
    async fn review_post(&self, id: i64, target: PostStatus) -> Result<Post, AppError> {
        let next = PostStatus::Pending.review(target)?;

        let result = sqlx::query(
            "UPDATE posts SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(next.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(PostStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<String> = sqlx::query_scalar("SELECT status FROM posts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            let current: PostStatus = current
                .ok_or_else(|| AppError::not_found("Post"))?
                .parse()
                .map_err(|e| AppError::Database(sqlx::Error::Decode(Box::new(e))))?;
            current.review(target)?;
            // Still pending yet untouched: the row changed under us.
            return Err(AppError::Conflict(
                "Post already reviewed by an admin".to_string(),
            ));
        }

        self.get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    // --- ORDERS ---

    async fn create_order(&self, user_id: i64, post_id: i64) -> Result<Order, AppError> {
        let id = sqlx::query("INSERT INTO orders (user_id, post_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        self.get_order(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order"))
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, AppError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, post_id, created_at FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order)
    }

    async fn list_orders(&self, user_id: Option<i64>) -> Result<Vec<Order>, AppError> {
        let orders = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, Order>(
                    "SELECT id, user_id, post_id, created_at FROM orders WHERE user_id = ? ORDER BY id DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Order>(
                    "SELECT id, user_id, post_id, created_at FROM orders ORDER BY id DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(orders)
    }

    async fn delete_order(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn create_review(
        &self,
        user_id: i64,
        post_id: i64,
        text: &str,
    ) -> Result<Review, AppError> {
        let id = sqlx::query("INSERT INTO reviews (user_id, post_id, review) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(post_id)
            .bind(text)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        self.get_review(id)
            .await?
            .ok_or_else(|| AppError::not_found("Review"))
    }

    async fn get_review(&self, id: i64) -> Result<Option<Review>, AppError> {
        let review = sqlx::query_as::<_, Review>(
            "SELECT id, user_id, post_id, review, created_at FROM reviews WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    async fn list_reviews(&self, post_id: i64) -> Result<Vec<Review>, AppError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT id, user_id, post_id, review, created_at FROM reviews WHERE post_id = ? ORDER BY id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn update_review(&self, id: i64, text: &str) -> Result<Option<Review>, AppError> {
        let result = sqlx::query("UPDATE reviews SET review = ? WHERE id = ?")
            .bind(text)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_review(id).await
    }

    async fn delete_review(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- DASHBOARD ---

    async fn get_stats(&self) -> Result<AdminDashboardStats, AppError> {
        let (total_users, total_categories, total_posts, pending_posts, total_orders, total_reviews) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM categories),
                    (SELECT COUNT(*) FROM posts),
                    (SELECT COUNT(*) FROM posts WHERE status = 'pending'),
                    (SELECT COUNT(*) FROM orders),
                    (SELECT COUNT(*) FROM reviews)
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AdminDashboardStats {
            total_users,
            total_categories,
            total_posts,
            pending_posts,
            total_orders,
            total_reviews,
        })
    }
}
