//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one aggregate.

pub mod cart;
pub mod favorite;
pub mod item;
pub mod order;
pub mod user;

pub use cart::{CartRepository, SqlxCartRepository};
pub use favorite::{FavoriteRepository, SqlxFavoriteRepository};
pub use item::{ItemRepository, SqlxItemRepository};
pub use order::{OrderRepository, SqlxOrderRepository};
pub use user::{SqlxUserRepository, UserRepository};
