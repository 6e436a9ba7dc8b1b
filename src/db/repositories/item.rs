//! Item repository
//!
//! Catalog storage. Deleting an item is a soft delete: the row stays so that
//! cart lines and order snapshots can still refer to it.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateItemInput, Item, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Item repository trait
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Insert a new active item
    async fn create(&self, input: &CreateItemInput) -> Result<Item>;

    /// Get an item by ID, including soft-deleted ones
    async fn get_by_id(&self, id: i64) -> Result<Option<Item>>;

    /// Active, non-deleted items, newest first, with the total matching count
    async fn list_active(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Item>, i64)>;

    /// Distinct non-empty categories of active items, sorted
    async fn categories(&self) -> Result<Vec<String>>;

    /// Persist every mutable field of `item`
    async fn update(&self, item: &Item) -> Result<Item>;

    /// Mark the item deleted and inactive
    async fn soft_delete(&self, id: i64) -> Result<()>;

    /// Count of non-deleted items
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based item repository implementation
pub struct SqlxItemRepository {
    pool: DynDatabasePool,
}

impl SqlxItemRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ItemRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ItemRepository for SqlxItemRepository {
    async fn create(&self, input: &CreateItemInput) -> Result<Item> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_item_sqlite(p, input).await,
            Backend::Mysql(p) => create_item_mysql(p, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Item>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_item_sqlite(p, id).await,
            Backend::Mysql(p) => get_item_mysql(p, id).await,
        }
    }

    async fn list_active(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<(Vec<Item>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_active_sqlite(p, category, params).await,
            Backend::Mysql(p) => list_active_mysql(p, category, params).await,
        }
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let sql = r#"
            SELECT DISTINCT category FROM items
            WHERE is_active = 1 AND deleted_at IS NULL
              AND category IS NOT NULL AND category <> ''
            ORDER BY category
        "#;
        let categories = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar::<_, String>(sql).fetch_all(p).await,
            Backend::Mysql(p) => sqlx::query_scalar::<_, String>(sql).fetch_all(p).await,
        };
        categories.context("Failed to list categories")
    }

    async fn update(&self, item: &Item) -> Result<Item> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_item_sqlite(p, item).await,
            Backend::Mysql(p) => update_item_mysql(p, item).await,
        }
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        let sql = "UPDATE items SET is_active = ?, deleted_at = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(false)
                .bind(now)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(false)
                .bind(now)
                .bind(now)
                .bind(id)
                .execute(p)
                .await
                .map(|_| ()),
        };
        result.context("Failed to delete item")
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM items WHERE deleted_at IS NULL";
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar::<_, i64>(sql).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar::<_, i64>(sql).fetch_one(p).await,
        };
        count.context("Failed to count items")
    }
}

const ITEM_COLUMNS: &str =
    "id, name, description, price, image_url, category, is_active, created_at, updated_at, deleted_at";

const ACTIVE_FILTER: &str = "is_active = 1 AND deleted_at IS NULL";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_item_sqlite(pool: &SqlitePool, input: &CreateItemInput) -> Result<Item> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO items (name, description, price, image_url, category, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(&input.image_url)
    .bind(&input.category)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    get_item_sqlite(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Item not found after insert"))
}

async fn get_item_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item")?;

    row.as_ref().map(row_to_item_sqlite).transpose()
}

async fn list_active_sqlite(
    pool: &SqlitePool,
    category: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Item>, i64)> {
    let (rows, total) = match category {
        Some(category) => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM items WHERE {} AND category = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                ITEM_COLUMNS, ACTIVE_FILTER
            ))
            .bind(category)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list items")?;
            let total: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM items WHERE {} AND category = ?",
                ACTIVE_FILTER
            ))
            .bind(category)
            .fetch_one(pool)
            .await
            .context("Failed to count items")?;
            (rows, total)
        }
        None => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM items WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                ITEM_COLUMNS, ACTIVE_FILTER
            ))
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list items")?;
            let total: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM items WHERE {}", ACTIVE_FILTER))
                    .fetch_one(pool)
                    .await
                    .context("Failed to count items")?;
            (rows, total)
        }
    };

    let items = rows.iter().map(row_to_item_sqlite).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn update_item_sqlite(pool: &SqlitePool, item: &Item) -> Result<Item> {
    sqlx::query(
        r#"
        UPDATE items
        SET name = ?, description = ?, price = ?, image_url = ?, category = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.price)
    .bind(&item.image_url)
    .bind(&item.category)
    .bind(item.is_active)
    .bind(Utc::now())
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    get_item_sqlite(pool, item.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Item not found after update"))
}

pub(crate) fn row_to_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Item> {
    Ok(Item {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        image_url: row.try_get("image_url")?,
        category: row.try_get("category")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_item_mysql(pool: &MySqlPool, input: &CreateItemInput) -> Result<Item> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO items (name, description, price, image_url, category, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.price)
    .bind(&input.image_url)
    .bind(&input.category)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create item")?;

    get_item_mysql(pool, result.last_insert_id() as i64)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Item not found after insert"))
}

async fn get_item_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Item>> {
    let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get item")?;

    row.as_ref().map(row_to_item_mysql).transpose()
}

async fn list_active_mysql(
    pool: &MySqlPool,
    category: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Item>, i64)> {
    let (rows, total) = match category {
        Some(category) => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM items WHERE {} AND category = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                ITEM_COLUMNS, ACTIVE_FILTER
            ))
            .bind(category)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list items")?;
            let total: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM items WHERE {} AND category = ?",
                ACTIVE_FILTER
            ))
            .bind(category)
            .fetch_one(pool)
            .await
            .context("Failed to count items")?;
            (rows, total)
        }
        None => {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM items WHERE {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                ITEM_COLUMNS, ACTIVE_FILTER
            ))
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
            .context("Failed to list items")?;
            let total: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM items WHERE {}", ACTIVE_FILTER))
                    .fetch_one(pool)
                    .await
                    .context("Failed to count items")?;
            (rows, total)
        }
    };

    let items = rows.iter().map(row_to_item_mysql).collect::<Result<Vec<_>>>()?;
    Ok((items, total))
}

async fn update_item_mysql(pool: &MySqlPool, item: &Item) -> Result<Item> {
    sqlx::query(
        r#"
        UPDATE items
        SET name = ?, description = ?, price = ?, image_url = ?, category = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.price)
    .bind(&item.image_url)
    .bind(&item.category)
    .bind(item.is_active)
    .bind(Utc::now())
    .bind(item.id)
    .execute(pool)
    .await
    .context("Failed to update item")?;

    get_item_mysql(pool, item.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Item not found after update"))
}

pub(crate) fn row_to_item_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Item> {
    Ok(Item {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        image_url: row.try_get("image_url")?,
        category: row.try_get("category")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxItemRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxItemRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_and_get_item() {
        let (_pool, repo) = setup_test_repo().await;
        let input = CreateItemInput::new("Mug", 10.0)
            .with_description("Ceramic")
            .with_category("Home");

        let created = repo.create(&input).await.expect("Failed to create item");
        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get item")
            .expect("Item not found");

        assert!(created.id > 0);
        assert_eq!(found.name, "Mug");
        assert_eq!(found.description, "Ceramic");
        assert_eq!(found.price, 10.0);
        assert_eq!(found.category.as_deref(), Some("Home"));
        assert!(found.is_active);
        assert!(found.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_list_active_filters_and_paginates() {
        let (_pool, repo) = setup_test_repo().await;
        for i in 0..5 {
            let category = if i % 2 == 0 { "Even" } else { "Odd" };
            repo.create(&CreateItemInput::new(format!("item-{}", i), 1.0).with_category(category))
                .await
                .unwrap();
        }

        let (page, total) = repo
            .list_active(None, &ListParams::new(Some(1), Some(2)))
            .await
            .expect("Failed to list items");
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "item-4");

        let (even, total) = repo
            .list_active(Some("Even"), &ListParams::default())
            .await
            .expect("Failed to list items");
        assert_eq!(total, 3);
        assert!(even.iter().all(|i| i.category.as_deref() == Some("Even")));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_listing() {
        let (_pool, repo) = setup_test_repo().await;
        let kept = repo.create(&CreateItemInput::new("Kept", 1.0)).await.unwrap();
        let gone = repo.create(&CreateItemInput::new("Gone", 1.0)).await.unwrap();

        repo.soft_delete(gone.id).await.expect("Failed to delete item");

        let (items, total) = repo.list_active(None, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, kept.id);

        let row = repo.get_by_id(gone.id).await.unwrap().expect("row is kept");
        assert!(row.is_deleted());
        assert!(!row.is_active);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_item() {
        let (_pool, repo) = setup_test_repo().await;
        let mut item = repo.create(&CreateItemInput::new("Mug", 10.0)).await.unwrap();

        item.price = 12.5;
        item.is_active = false;
        let updated = repo.update(&item).await.expect("Failed to update item");

        assert_eq!(updated.price, 12.5);
        assert!(!updated.is_active);
    }

    #[tokio::test]
    async fn test_categories_distinct_sorted() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&CreateItemInput::new("a", 1.0).with_category("Office")).await.unwrap();
        repo.create(&CreateItemInput::new("b", 1.0).with_category("Home")).await.unwrap();
        repo.create(&CreateItemInput::new("c", 1.0).with_category("Home")).await.unwrap();
        repo.create(&CreateItemInput::new("d", 1.0)).await.unwrap();
        let hidden = repo
            .create(&CreateItemInput::new("e", 1.0).with_category("Hidden"))
            .await
            .unwrap();
        repo.soft_delete(hidden.id).await.unwrap();

        let categories = repo.categories().await.expect("Failed to list categories");

        assert_eq!(categories, vec!["Home", "Office"]);
    }
}
