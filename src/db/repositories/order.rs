//! Order repository
//!
//! Orders and their line snapshots. `place_from_cart` is the only
//! multi-statement write in the service and runs in one transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, NewOrderLine, Order, OrderLine, OrderStatus, OrderWithLines};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Order repository trait
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Write a confirmed order with `lines` and remove the cart lines they were
    /// taken from, atomically.
    ///
    /// Returns `None` and writes nothing when any source line has since been
    /// removed or had its quantity changed.
    async fn place_from_cart(
        &self,
        user_id: i64,
        cart_id: i64,
        note: Option<&str>,
        lines: &[NewOrderLine],
    ) -> Result<Option<OrderWithLines>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<OrderWithLines>>;

    /// The user's orders, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<OrderWithLines>>;

    /// All orders, newest first, with the total count
    async fn list(&self, params: &ListParams) -> Result<(Vec<OrderWithLines>, i64)>;

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<()>;
}

/// SQLx-based order repository implementation
pub struct SqlxOrderRepository {
    pool: DynDatabasePool,
}

impl SqlxOrderRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrderRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn place_from_cart(
        &self,
        user_id: i64,
        cart_id: i64,
        note: Option<&str>,
        lines: &[NewOrderLine],
    ) -> Result<Option<OrderWithLines>> {
        let order_id = match self.pool.backend() {
            Backend::Sqlite(p) => place_order_sqlite(p, user_id, cart_id, note, lines).await?,
            Backend::Mysql(p) => place_order_mysql(p, user_id, cart_id, note, lines).await?,
        };
        let Some(order_id) = order_id else {
            return Ok(None);
        };

        let order = self
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Order not found after checkout"))?;
        Ok(Some(order))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<OrderWithLines>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_order_sqlite(p, id).await,
            Backend::Mysql(p) => get_order_mysql(p, id).await,
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<OrderWithLines>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_by_user_sqlite(p, user_id).await,
            Backend::Mysql(p) => list_by_user_mysql(p, user_id).await,
        }
    }

    async fn list(&self, params: &ListParams) -> Result<(Vec<OrderWithLines>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_orders_sqlite(p, params).await,
            Backend::Mysql(p) => list_orders_mysql(p, params).await,
        }
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<()> {
        let sql = "UPDATE orders SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let status = status.to_string();
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql).bind(&status).bind(now).bind(id).execute(p).await.map(|_| ()),
            Backend::Mysql(p) => sqlx::query(sql).bind(&status).bind(now).bind(id).execute(p).await.map(|_| ()),
        };
        result.context("Failed to update order status")
    }
}

const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, note, created_at, updated_at";
const LINE_COLUMNS: &str =
    "id, order_id, item_id, item_name, item_price, quantity, subtotal, created_at";

const CONSUME_CART_LINE: &str =
    "DELETE FROM cart_items WHERE id = ? AND cart_id = ? AND quantity = ?";

fn order_total(lines: &[NewOrderLine]) -> f64 {
    lines.iter().map(NewOrderLine::subtotal).sum()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn place_order_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    cart_id: i64,
    note: Option<&str>,
    lines: &[NewOrderLine],
) -> Result<Option<i64>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin checkout")?;

    for line in lines {
        let consumed = sqlx::query(CONSUME_CART_LINE)
            .bind(line.cart_line_id)
            .bind(cart_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .context("Failed to remove cart line")?
            .rows_affected();
        if consumed != 1 {
            tx.rollback().await.context("Failed to roll back checkout")?;
            return Ok(None);
        }
    }

    let order_id = sqlx::query(
        r#"
        INSERT INTO orders (user_id, total_amount, status, note, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(order_total(lines))
    .bind(OrderStatus::Confirmed.to_string())
    .bind(note)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?
    .last_insert_rowid();

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, item_id, item_name, item_price, quantity, subtotal, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(line.item_id)
        .bind(&line.item_name)
        .bind(line.item_price)
        .bind(line.quantity)
        .bind(line.subtotal())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create order line")?;
    }

    tx.commit().await.context("Failed to commit checkout")?;
    Ok(Some(order_id))
}

async fn get_order_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<OrderWithLines>> {
    let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?;

    match row {
        Some(row) => {
            let order = row_to_order_sqlite(&row)?;
            Ok(Some(with_lines_sqlite(pool, order).await?))
        }
        None => Ok(None),
    }
}

async fn list_by_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<OrderWithLines>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list orders")?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push(with_lines_sqlite(pool, row_to_order_sqlite(row)?).await?);
    }
    Ok(orders)
}

async fn list_orders_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
) -> Result<(Vec<OrderWithLines>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM orders ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ORDER_COLUMNS
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list orders")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .context("Failed to count orders")?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push(with_lines_sqlite(pool, row_to_order_sqlite(row)?).await?);
    }
    Ok((orders, total))
}

async fn with_lines_sqlite(pool: &SqlitePool, order: Order) -> Result<OrderWithLines> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM order_items WHERE order_id = ? ORDER BY id",
        LINE_COLUMNS
    ))
    .bind(order.id)
    .fetch_all(pool)
    .await
    .context("Failed to load order lines")?;

    let lines = rows
        .iter()
        .map(|row| {
            Ok(OrderLine {
                id: row.try_get("id")?,
                order_id: row.try_get("order_id")?,
                item_id: row.try_get("item_id")?,
                item_name: row.try_get("item_name")?,
                item_price: row.try_get("item_price")?,
                quantity: row.try_get("quantity")?,
                subtotal: row.try_get("subtotal")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(OrderWithLines { order, lines })
}

fn row_to_order_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total_amount: row.try_get("total_amount")?,
        status: OrderStatus::from_str(&status)?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn place_order_mysql(
    pool: &MySqlPool,
    user_id: i64,
    cart_id: i64,
    note: Option<&str>,
    lines: &[NewOrderLine],
) -> Result<Option<i64>> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin checkout")?;

    for line in lines {
        let consumed = sqlx::query(CONSUME_CART_LINE)
            .bind(line.cart_line_id)
            .bind(cart_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .context("Failed to remove cart line")?
            .rows_affected();
        if consumed != 1 {
            tx.rollback().await.context("Failed to roll back checkout")?;
            return Ok(None);
        }
    }

    let order_id = sqlx::query(
        r#"
        INSERT INTO orders (user_id, total_amount, status, note, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(order_total(lines))
    .bind(OrderStatus::Confirmed.to_string())
    .bind(note)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?
    .last_insert_id() as i64;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, item_id, item_name, item_price, quantity, subtotal, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(line.item_id)
        .bind(&line.item_name)
        .bind(line.item_price)
        .bind(line.quantity)
        .bind(line.subtotal())
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create order line")?;
    }

    tx.commit().await.context("Failed to commit checkout")?;
    Ok(Some(order_id))
}

async fn get_order_mysql(pool: &MySqlPool, id: i64) -> Result<Option<OrderWithLines>> {
    let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?;

    match row {
        Some(row) => {
            let order = row_to_order_mysql(&row)?;
            Ok(Some(with_lines_mysql(pool, order).await?))
        }
        None => Ok(None),
    }
}

async fn list_by_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<OrderWithLines>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list orders")?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push(with_lines_mysql(pool, row_to_order_mysql(row)?).await?);
    }
    Ok(orders)
}

async fn list_orders_mysql(
    pool: &MySqlPool,
    params: &ListParams,
) -> Result<(Vec<OrderWithLines>, i64)> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM orders ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        ORDER_COLUMNS
    ))
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list orders")?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .context("Failed to count orders")?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        orders.push(with_lines_mysql(pool, row_to_order_mysql(row)?).await?);
    }
    Ok((orders, total))
}

async fn with_lines_mysql(pool: &MySqlPool, order: Order) -> Result<OrderWithLines> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM order_items WHERE order_id = ? ORDER BY id",
        LINE_COLUMNS
    ))
    .bind(order.id)
    .fetch_all(pool)
    .await
    .context("Failed to load order lines")?;

    let lines = rows
        .iter()
        .map(|row| {
            Ok(OrderLine {
                id: row.try_get("id")?,
                order_id: row.try_get("order_id")?,
                item_id: row.try_get("item_id")?,
                item_name: row.try_get("item_name")?,
                item_price: row.try_get("item_price")?,
                quantity: row.try_get::<i32, _>("quantity")? as i64,
                subtotal: row.try_get("subtotal")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(OrderWithLines { order, lines })
}

fn row_to_order_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total_amount: row.try_get("total_amount")?,
        status: OrderStatus::from_str(&status)?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
