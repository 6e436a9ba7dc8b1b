//! User repository
//!
//! Accounts and the single stored session token per user. The token column
//! is the source of truth for "is this session still current".

use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert `user`; the password must already be hashed
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// List every user, oldest first
    async fn list(&self) -> Result<Vec<User>>;

    /// Store `token` as the user's only live session
    async fn set_token(&self, id: i64, token: &str) -> Result<()>;

    /// Clear the user's stored session
    async fn clear_token(&self, id: i64) -> Result<()>;

    /// Clear every stored session. Returns the number of users affected.
    async fn clear_all_tokens(&self) -> Result<u64>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_user_sqlite(p, user).await,
            Backend::Mysql(p) => create_user_mysql(p, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_user_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_user_by_id_mysql(p, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_user_by_username_sqlite(p, username).await,
            Backend::Mysql(p) => get_user_by_username_mysql(p, username).await,
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_users_sqlite(p).await,
            Backend::Mysql(p) => list_users_mysql(p).await,
        }
    }

    async fn set_token(&self, id: i64, token: &str) -> Result<()> {
        let sql = "UPDATE users SET token = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(token).bind(now).bind(id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(token).bind(now).bind(id).execute(p).await.map(|_| ()),
        };
        result.context("Failed to store session token")
    }

    async fn clear_token(&self, id: i64) -> Result<()> {
        let sql = "UPDATE users SET token = NULL, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(now).bind(id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(now).bind(id).execute(p).await.map(|_| ()),
        };
        result.context("Failed to clear session token")
    }

    async fn clear_all_tokens(&self) -> Result<u64> {
        let sql = "UPDATE users SET token = NULL WHERE token IS NOT NULL";
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
        };
        result.context("Failed to clear session tokens")
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, token, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        token: None,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        token: row.try_get("token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        token: None,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn get_user_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        token: row.try_get("token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
