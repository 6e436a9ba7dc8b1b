//! Favorites repository
//!
//! A plain user/item join table.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Item;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use super::item::{row_to_item_sqlite, row_to_item_mysql};

#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    async fn is_favorite(&self, user_id: i64, item_id: i64) -> Result<bool>;

    async fn add(&self, user_id: i64, item_id: i64) -> Result<()>;

    async fn remove(&self, user_id: i64, item_id: i64) -> Result<()>;

    /// Favorited items that still exist, most recently favorited first
    async fn list_items(&self, user_id: i64) -> Result<Vec<Item>>;
}

pub struct SqlxFavoriteRepository {
    pool: DynDatabasePool,
}

impl SqlxFavoriteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FavoriteRepository> {
        Arc::new(Self::new(pool))
    }
}

const LIST_SQL: &str = r#"
    SELECT i.id, i.name, i.description, i.price, i.image_url, i.category, i.is_active,
           i.created_at, i.updated_at, i.deleted_at
    FROM user_favorites f
    JOIN items i ON i.id = f.item_id
    WHERE f.user_id = ? AND i.deleted_at IS NULL
    ORDER BY f.created_at DESC, i.id DESC
"#;

#[async_trait]
impl FavoriteRepository for SqlxFavoriteRepository {
    async fn is_favorite(&self, user_id: i64, item_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM user_favorites WHERE user_id = ? AND item_id = ?";
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar::<_, i64>(sql).bind(user_id).bind(item_id).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar::<_, i64>(sql).bind(user_id).bind(item_id).fetch_one(p).await,
        };
        Ok(count.context("Failed to check favorite")? > 0)
    }

    async fn add(&self, user_id: i64, item_id: i64) -> Result<()> {
        let now = Utc::now();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(
                "INSERT INTO user_favorites (user_id, item_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(item_id)
            .bind(now)
            .execute(p)
            .await
            .map(|_| ()),
            Backend::Mysql(p) => sqlx::query(
                "INSERT IGNORE INTO user_favorites (user_id, item_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(item_id)
            .bind(now)
            .execute(p)
            .await
            .map(|_| ()),
        };
        result.context("Failed to add favorite")
    }

    async fn remove(&self, user_id: i64, item_id: i64) -> Result<()> {
        let sql = "DELETE FROM user_favorites WHERE user_id = ? AND item_id = ?";
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(user_id).bind(item_id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(user_id).bind(item_id).execute(p).await.map(|_| ()),
        };
        result.context("Failed to remove favorite")
    }

    async fn list_items(&self, user_id: i64) -> Result<Vec<Item>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(LIST_SQL).bind(user_id).fetch_all(p).await
                    .context("Failed to list favorites")?;
                rows.iter().map(row_to_item_sqlite).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(LIST_SQL).bind(user_id).fetch_all(p).await
                    .context("Failed to list favorites")?;
                rows.iter().map(row_to_item_mysql).collect()
            }
        }
    }
}
