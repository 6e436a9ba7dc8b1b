//! Cart repository
//!
//! Carts and their lines. A user has at most one cart (`carts.user_id` is
//! unique) and a cart has at most one line per item.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Cart, CartLine, CartLineWithItem, Item};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Cart repository trait
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The user's cart, if one has been created
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Cart>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Cart>>;

    /// Find the user's cart, creating it if needed.
    ///
    /// Losing a creation race to a concurrent request is not an error.
    async fn get_or_create(&self, user_id: i64) -> Result<Cart>;

    /// Every cart, oldest first
    async fn list_all(&self) -> Result<Vec<Cart>>;

    /// Add `quantity` of an item, incrementing the existing line if there is one
    async fn add_line(&self, cart_id: i64, item_id: i64, quantity: i64) -> Result<CartLine>;

    async fn get_line(&self, line_id: i64) -> Result<Option<CartLine>>;

    /// Overwrite a line's quantity (must be >= 1)
    async fn set_line_quantity(&self, line_id: i64, quantity: i64) -> Result<()>;

    async fn delete_line(&self, line_id: i64) -> Result<()>;

    /// Remove every line of the cart. Returns the number removed.
    async fn clear(&self, cart_id: i64) -> Result<u64>;

    /// Lines joined with their items; deleted items come back as `None`
    async fn lines_with_items(&self, cart_id: i64) -> Result<Vec<CartLineWithItem>>;
}

/// SQLx-based cart repository implementation
pub struct SqlxCartRepository {
    pool: DynDatabasePool,
}

impl SqlxCartRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CartRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CartRepository for SqlxCartRepository {
    async fn find_by_user(&self, user_id: i64) -> Result<Option<Cart>> {
        let sql = "SELECT id, user_id, created_at, updated_at FROM carts WHERE user_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(sql).bind(user_id).fetch_optional(p).await
                    .context("Failed to get cart by user")?;
                row.as_ref().map(row_to_cart_sqlite).transpose()
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(sql).bind(user_id).fetch_optional(p).await
                    .context("Failed to get cart by user")?;
                row.as_ref().map(row_to_cart_mysql).transpose()
            }
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Cart>> {
        let sql = "SELECT id, user_id, created_at, updated_at FROM carts WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(sql).bind(id).fetch_optional(p).await
                    .context("Failed to get cart")?;
                row.as_ref().map(row_to_cart_sqlite).transpose()
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(sql).bind(id).fetch_optional(p).await
                    .context("Failed to get cart")?;
                row.as_ref().map(row_to_cart_mysql).transpose()
            }
        }
    }

    async fn get_or_create(&self, user_id: i64) -> Result<Cart> {
        let now = Utc::now();
        let inserted = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(
                "INSERT INTO carts (user_id, created_at, updated_at) VALUES (?, ?, ?) ON CONFLICT(user_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(
                "INSERT IGNORE INTO carts (user_id, created_at, updated_at) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.rows_affected()),
        };
        if inserted.context("Failed to create cart")? > 0 {
            tracing::debug!(user_id, "Created cart");
        }

        self.find_by_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Cart not found after insert"))
    }

    async fn list_all(&self) -> Result<Vec<Cart>> {
        let sql = "SELECT id, user_id, created_at, updated_at FROM carts ORDER BY id";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(sql).fetch_all(p).await.context("Failed to list carts")?;
                rows.iter().map(row_to_cart_sqlite).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(sql).fetch_all(p).await.context("Failed to list carts")?;
                rows.iter().map(row_to_cart_mysql).collect()
            }
        }
    }

    async fn add_line(&self, cart_id: i64, item_id: i64, quantity: i64) -> Result<CartLine> {
        let now = Utc::now();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, item_id, quantity, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(cart_id, item_id)
                DO UPDATE SET quantity = cart_items.quantity + excluded.quantity,
                              updated_at = excluded.updated_at
                "#,
            )
            .bind(cart_id)
            .bind(item_id)
            .bind(quantity)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .map(|_| ()),
            Backend::Mysql(p) => sqlx::query(
                r#"
                INSERT INTO cart_items (cart_id, item_id, quantity, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON DUPLICATE KEY UPDATE quantity = quantity + VALUES(quantity),
                                        updated_at = VALUES(updated_at)
                "#,
            )
            .bind(cart_id)
            .bind(item_id)
            .bind(quantity)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .map(|_| ()),
        };
        result.context("Failed to add cart line")?;

        let sql = format!("SELECT {} FROM cart_items WHERE cart_id = ? AND item_id = ?", LINE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql).bind(cart_id).bind(item_id).fetch_one(p).await
                    .context("Failed to read cart line")?;
                row_to_line_sqlite(&row)
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql).bind(cart_id).bind(item_id).fetch_one(p).await
                    .context("Failed to read cart line")?;
                row_to_line_mysql(&row)
            }
        }
    }

    async fn get_line(&self, line_id: i64) -> Result<Option<CartLine>> {
        let sql = format!("SELECT {} FROM cart_items WHERE id = ?", LINE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql).bind(line_id).fetch_optional(p).await
                    .context("Failed to get cart line")?;
                row.as_ref().map(row_to_line_sqlite).transpose()
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql).bind(line_id).fetch_optional(p).await
                    .context("Failed to get cart line")?;
                row.as_ref().map(row_to_line_mysql).transpose()
            }
        }
    }

    async fn set_line_quantity(&self, line_id: i64, quantity: i64) -> Result<()> {
        let sql = "UPDATE cart_items SET quantity = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(quantity).bind(now).bind(line_id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(quantity).bind(now).bind(line_id).execute(p).await.map(|_| ()),
        };
        result.context("Failed to update cart line")
    }

    async fn delete_line(&self, line_id: i64) -> Result<()> {
        let sql = "DELETE FROM cart_items WHERE id = ?";
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(line_id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(line_id).execute(p).await.map(|_| ()),
        };
        result.context("Failed to delete cart line")
    }

    async fn clear(&self, cart_id: i64) -> Result<u64> {
        let sql = "DELETE FROM cart_items WHERE cart_id = ?";
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(cart_id).execute(p).await.map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(sql).bind(cart_id).execute(p).await.map(|r| r.rows_affected()),
        };
        result.context("Failed to clear cart")
    }

    async fn lines_with_items(&self, cart_id: i64) -> Result<Vec<CartLineWithItem>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let rows = sqlx::query(LINES_WITH_ITEMS_SQL).bind(cart_id).fetch_all(p).await
                    .context("Failed to load cart lines")?;
                rows.iter().map(row_to_line_with_item_sqlite).collect()
            }
            Backend::Mysql(p) => {
                let rows = sqlx::query(LINES_WITH_ITEMS_SQL).bind(cart_id).fetch_all(p).await
                    .context("Failed to load cart lines")?;
                rows.iter().map(row_to_line_with_item_mysql).collect()
            }
        }
    }
}

const LINE_COLUMNS: &str = "id, cart_id, item_id, quantity, created_at, updated_at";

const LINES_WITH_ITEMS_SQL: &str = r#"
    SELECT ci.id, ci.cart_id, ci.item_id, ci.quantity, ci.created_at, ci.updated_at,
           i.id AS i_id, i.name AS i_name, i.description AS i_description, i.price AS i_price,
           i.image_url AS i_image_url, i.category AS i_category, i.is_active AS i_is_active,
           i.created_at AS i_created_at, i.updated_at AS i_updated_at
    FROM cart_items ci
    LEFT JOIN items i ON i.id = ci.item_id AND i.deleted_at IS NULL
    WHERE ci.cart_id = ?
    ORDER BY ci.id
"#;

fn row_to_cart_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Cart> {
    Ok(Cart {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CartLine> {
    Ok(CartLine {
        id: row.try_get("id")?,
        cart_id: row.try_get("cart_id")?,
        item_id: row.try_get("item_id")?,
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line_with_item_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CartLineWithItem> {
    let line = row_to_line_sqlite(row)?;
    let item = match row.try_get::<Option<i64>, _>("i_id")? {
        Some(id) => Some(Item {
            id,
            name: row.try_get("i_name")?,
            description: row.try_get("i_description")?,
            price: row.try_get("i_price")?,
            image_url: row.try_get("i_image_url")?,
            category: row.try_get("i_category")?,
            is_active: row.try_get("i_is_active")?,
            created_at: row.try_get("i_created_at")?,
            updated_at: row.try_get("i_updated_at")?,
            deleted_at: None,
        }),
        None => None,
    };
    Ok(CartLineWithItem { line, item })
}

fn row_to_cart_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Cart> {
    Ok(Cart {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CartLine> {
    Ok(CartLine {
        id: row.try_get("id")?,
        cart_id: row.try_get("cart_id")?,
        item_id: row.try_get("item_id")?,
        quantity: row.try_get::<i32, _>("quantity")? as i64,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line_with_item_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CartLineWithItem> {
    let line = row_to_line_mysql(row)?;
    let item = match row.try_get::<Option<i64>, _>("i_id")? {
        Some(id) => Some(Item {
            id,
            name: row.try_get("i_name")?,
            description: row.try_get("i_description")?,
            price: row.try_get("i_price")?,
            image_url: row.try_get("i_image_url")?,
            category: row.try_get("i_category")?,
            is_active: row.try_get("i_is_active")?,
            created_at: row.try_get("i_created_at")?,
            updated_at: row.try_get("i_updated_at")?,
            deleted_at: None,
        }),
        None => None,
    };
    Ok(CartLineWithItem { line, item })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{ItemRepository, SqlxItemRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateItemInput, User};

    struct Fixture {
        repo: SqlxCartRepository,
        items: SqlxItemRepository,
        user_id: i64,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("alice".into(), String::new(), "hash".into()))
            .await
            .expect("Failed to create user");
        Fixture {
            repo: SqlxCartRepository::new(pool.clone()),
            items: SqlxItemRepository::new(pool),
            user_id: user.id,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let f = setup().await;
        assert!(f.repo.find_by_user(f.user_id).await.unwrap().is_none());

        let first = f.repo.get_or_create(f.user_id).await.expect("Failed to create cart");
        let second = f.repo.get_or_create(f.user_id).await.expect("Failed to get cart");

        assert_eq!(first.id, second.id);
        assert_eq!(f.repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_line_increments_existing() {
        let f = setup().await;
        let cart = f.repo.get_or_create(f.user_id).await.unwrap();
        let item = f.items.create(&CreateItemInput::new("Mug", 10.0)).await.unwrap();

        let first = f.repo.add_line(cart.id, item.id, 2).await.expect("Failed to add line");
        let second = f.repo.add_line(cart.id, item.id, 3).await.expect("Failed to add line");

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(f.repo.lines_with_items(cart.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_quantity_delete_and_clear() {
        let f = setup().await;
        let cart = f.repo.get_or_create(f.user_id).await.unwrap();
        let a = f.items.create(&CreateItemInput::new("A", 1.0)).await.unwrap();
        let b = f.items.create(&CreateItemInput::new("B", 2.0)).await.unwrap();
        let line_a = f.repo.add_line(cart.id, a.id, 1).await.unwrap();
        let line_b = f.repo.add_line(cart.id, b.id, 1).await.unwrap();

        f.repo.set_line_quantity(line_a.id, 7).await.expect("Failed to update line");
        assert_eq!(f.repo.get_line(line_a.id).await.unwrap().unwrap().quantity, 7);

        f.repo.delete_line(line_b.id).await.expect("Failed to delete line");
        assert!(f.repo.get_line(line_b.id).await.unwrap().is_none());

        assert_eq!(f.repo.clear(cart.id).await.expect("Failed to clear"), 1);
        assert!(f.repo.lines_with_items(cart.id).await.unwrap().is_empty());
        assert!(f.repo.find_by_id(cart.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lines_with_items_hides_deleted_item() {
        let f = setup().await;
        let cart = f.repo.get_or_create(f.user_id).await.unwrap();
        let kept = f.items.create(&CreateItemInput::new("Kept", 10.0)).await.unwrap();
        let gone = f.items.create(&CreateItemInput::new("Gone", 5.0)).await.unwrap();
        f.repo.add_line(cart.id, kept.id, 2).await.unwrap();
        f.repo.add_line(cart.id, gone.id, 1).await.unwrap();

        f.items.soft_delete(gone.id).await.unwrap();
        let lines = f.repo.lines_with_items(cart.id).await.expect("Failed to load lines");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].item.as_ref().map(|i| i.price), Some(10.0));
        assert!(lines[1].item.is_none());
        assert_eq!(lines[1].line.item_id, gone.id);
    }
}
