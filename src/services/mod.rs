//! Services layer - Business logic
//!
//! Services own the rules: session handling, catalog validation, cart
//! valuation and checkout. They sit between the HTTP handlers and the
//! repositories and return their own error enums.

pub mod cart;
pub mod favorite;
pub mod item;
pub mod order;
pub mod password;
pub mod token;
pub mod user;

pub use cart::{CartService, CartServiceError, LineUpdate};
pub use favorite::{FavoriteService, FavoriteServiceError};
pub use item::{ItemService, ItemServiceError};
pub use order::{OrderService, OrderServiceError};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenError, TokenService};
pub use user::{GuardError, LoginInput, LoginOutcome, RegisterInput, UserService, UserServiceError};
