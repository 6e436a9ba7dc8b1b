//! Cart model
//!
//! One cart per user. Line totals are always computed from the live item
//! price, so nothing in here is stored as a money amount.

use super::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cart row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in a cart: an item reference and a quantity (>= 1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub id: i64,
    pub cart_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with its item.
///
/// `item` is `None` once the item has been soft-deleted.
#[derive(Debug, Clone)]
pub struct CartLineWithItem {
    pub line: CartLine,
    pub item: Option<Item>,
}

impl CartLineWithItem {
    /// quantity x current price; zero for a deleted item
    pub fn subtotal(&self) -> f64 {
        match &self.item {
            Some(item) => item.price * self.line.quantity as f64,
            None => 0.0,
        }
    }
}

/// A cart with its hydrated lines
#[derive(Debug, Clone)]
pub struct CartView {
    pub cart: Cart,
    pub lines: Vec<CartLineWithItem>,
}

impl CartView {
    /// Live total over all lines whose item still exists
    pub fn total(&self) -> f64 {
        self.lines.iter().map(CartLineWithItem::subtotal).sum()
    }

    /// Sum of line quantities
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.line.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Placeholder returned for a user that has never added anything
    pub fn empty_for(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            cart: Cart {
                id: 0,
                user_id,
                created_at: now,
                updated_at: now,
            },
            lines: Vec::new(),
        }
    }
}
