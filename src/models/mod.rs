//! Data models
//!
//! Entities persisted by the repositories and the input types the services
//! accept: users, catalog items, carts and orders.

mod cart;
mod item;
mod order;
mod pagination;
mod user;

pub use cart::{Cart, CartLine, CartLineWithItem, CartView};
pub use item::{CreateItemInput, Item, UpdateItemInput};
pub use order::{NewOrderLine, Order, OrderLine, OrderStatus, OrderWithLines};
pub use pagination::{ListParams, PagedResult, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use user::{CreateUserInput, User};
