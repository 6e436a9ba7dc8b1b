//! Connection pools
//!
//! `DatabasePool` hides whether the store is SQLite or MySQL. Repositories
//! call `backend()` and pick the dialect per query; everything else only
//! needs `ping`, `execute` and `close`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, sync::Arc, time::Duration};

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 10;
const MYSQL_MAX_CONNECTIONS: u32 = 30;
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Borrowed handle to the concrete pool behind a `DatabasePool`.
///
/// Repositories match on this to pick the SQL dialect for a query.
#[derive(Clone, Copy)]
pub enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

/// A connection pool for one of the supported drivers
#[async_trait]
pub trait DatabasePool: Send + Sync {
    fn driver(&self) -> DatabaseDriver;

    /// The concrete pool, for dialect-specific queries
    fn backend(&self) -> Backend<'_>;

    async fn close(&self);

    /// Run a statement that returns no rows; yields rows affected
    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = match self.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).execute(pool).await.map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql).execute(pool).await.map(|r| r.rows_affected()),
        };
        result.with_context(|| format!("Failed to execute: {}", sql))
    }

    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()> {
        let result = match self.backend() {
            Backend::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Backend::Mysql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        };
        result.context("Database ping failed")
    }
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (and create if missing) a SQLite database.
    ///
    /// Accepts `:memory:`, a `sqlite:` URL, or a plain file path. Parent
    /// directories of a file path are created.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url == ":memory:" || url.starts_with("sqlite::memory:");
        let options = if url == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else if url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(url)
                .with_context(|| format!("Invalid SQLite URL: {}", url))?
        } else {
            if let Some(parent) = Path::new(url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory: {}", parent.display())
                    })?;
                }
            }
            SqliteConnectOptions::new().filename(url)
        };

        let options = options
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(SQLITE_BUSY_TIMEOUT);

        // Every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(SQLITE_MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn backend(&self) -> Backend<'_> {
        Backend::Sqlite(&self.pool)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    /// Connect to MySQL; a URL without scheme gets `mysql://` prepended
    pub async fn connect(url: &str) -> Result<Self> {
        let url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn backend(&self) -> Backend<'_> {
        Backend::Mysql(&self.pool)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open the pool selected by `database.driver`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::connect(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::connect(&config.url).await?),
    };
    Ok(pool)
}

/// A fresh in-memory SQLite database. Each call gets its own.
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
        seed_items: false,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_config(url: String) -> DatabaseConfig {
        DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url,
            seed_items: false,
        }
    }

    #[tokio::test]
    async fn test_memory_pool() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(matches!(pool.backend(), Backend::Sqlite(_)));
        pool.ping().await.expect("Ping should succeed");
    }

    #[tokio::test]
    async fn test_execute_reports_rows_affected() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        pool.execute("CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .expect("Failed to create table");
        let affected = pool
            .execute("INSERT INTO products (name) VALUES ('mug'), ('lamp')")
            .await
            .expect("Failed to insert");

        assert_eq!(affected, 2);
        assert!(pool.execute("SELEC nonsense").await.is_err());
    }

    #[tokio::test]
    async fn test_file_pool_creates_directories() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("sqlite").join("shop.db");

        let pool = create_pool(&sqlite_config(db_path.to_string_lossy().to_string()))
            .await
            .expect("Failed to create pool");
        pool.ping().await.expect("Ping should succeed");

        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        pool.execute("CREATE TABLE parents (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        pool.execute(
            "CREATE TABLE children (id INTEGER PRIMARY KEY, parent_id INTEGER NOT NULL REFERENCES parents(id))",
        )
        .await
        .unwrap();

        for _ in 0..3 {
            assert!(pool
                .execute("INSERT INTO children (parent_id) VALUES (42)")
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn test_test_pools_are_isolated() {
        let first = create_test_pool().await.expect("Failed to create test pool");
        let second = create_test_pool().await.expect("Failed to create test pool");

        first
            .execute("CREATE TABLE only_here (id INTEGER PRIMARY KEY)")
            .await
            .expect("Failed to create table");

        assert!(second.execute("SELECT * FROM only_here").await.is_err());
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/shopease_test".to_string());

        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
            seed_items: false,
        })
        .await
        .expect("Failed to create pool");

        assert!(matches!(pool.backend(), Backend::Mysql(_)));
        pool.ping().await.expect("Ping should succeed");
    }
}
