//! Database layer
//!
//! Storage for users, the catalog, carts and orders. Two backends are supported:
//! - SQLite (default, single-file deployment)
//! - MySQL
//!
//! The driver is selected by `database.driver` in the configuration. Code above
//! this layer only sees the `DatabasePool` trait and the repository traits.
//!
//! # Usage
//!
//! ```ignore
//! use shopease::config::DatabaseConfig;
//! use shopease::db::{create_pool, migrations, seed};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! seed::seed_items(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod seed;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
