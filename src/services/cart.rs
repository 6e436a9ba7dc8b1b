//! Cart service
//!
//! Each user has a single cart, created on the first add. Lines are valued
//! against the live catalog price every time the cart is read.

use crate::db::repositories::{CartRepository, ItemRepository};
use crate::models::{Cart, CartLine, CartView};
use anyhow::Context;
use std::sync::Arc;

/// Most units of one item a cart line can hold
pub const MAX_LINE_QUANTITY: i64 = 10_000;

fn quantity_too_large() -> CartServiceError {
    CartServiceError::ValidationError(format!(
        "quantity must be at most {}",
        MAX_LINE_QUANTITY
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum CartServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Item not found")]
    ItemNotFound,

    #[error("Item is not available")]
    ItemInactive,

    #[error("Cart item not found")]
    LineNotFound,

    /// The line belongs to another user's cart
    #[error("Not authorized to modify this cart")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Outcome of setting a line's quantity
#[derive(Debug)]
pub enum LineUpdate {
    Updated(CartView),
    /// Quantity 0 removed the line
    Removed,
}

pub struct CartService {
    carts: Arc<dyn CartRepository>,
    items: Arc<dyn ItemRepository>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, items: Arc<dyn ItemRepository>) -> Self {
        Self { carts, items }
    }

    /// Add `quantity` of an item to the user's cart, creating the cart if needed.
    ///
    /// Adding an item already in the cart increments that line; the resulting
    /// quantity may not exceed `MAX_LINE_QUANTITY`.
    pub async fn add_item(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: i64,
    ) -> Result<CartView, CartServiceError> {
        if quantity < 1 {
            return Err(CartServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(quantity_too_large());
        }

        let item = match self.items.get_by_id(item_id).await.context("Failed to get item")? {
            Some(item) if !item.is_deleted() => item,
            _ => return Err(CartServiceError::ItemNotFound),
        };
        if !item.is_available() {
            return Err(CartServiceError::ItemInactive);
        }

        let cart = self.carts.get_or_create(user_id).await.context("Failed to get cart")?;
        let in_cart = self
            .carts
            .lines_with_items(cart.id)
            .await
            .context("Failed to load cart items")?
            .iter()
            .find(|l| l.line.item_id == item.id)
            .map_or(0, |l| l.line.quantity);
        if in_cart + quantity > MAX_LINE_QUANTITY {
            return Err(quantity_too_large());
        }

        self.carts
            .add_line(cart.id, item.id, quantity)
            .await
            .context("Failed to add item to cart")?;

        self.view(cart).await
    }

    /// The user's cart, or `None` if they have never added anything
    pub async fn get_cart(&self, user_id: i64) -> Result<Option<CartView>, CartServiceError> {
        match self.carts.find_by_user(user_id).await.context("Failed to get cart")? {
            Some(cart) => Ok(Some(self.view(cart).await?)),
            None => Ok(None),
        }
    }

    /// Every cart with its lines
    pub async fn list_all(&self) -> Result<Vec<CartView>, CartServiceError> {
        let carts = self.carts.list_all().await.context("Failed to list carts")?;
        let mut views = Vec::with_capacity(carts.len());
        for cart in carts {
            views.push(self.view(cart).await?);
        }
        Ok(views)
    }

    /// Overwrite a line's quantity; zero removes the line.
    pub async fn update_line(
        &self,
        user_id: i64,
        line_id: i64,
        quantity: i64,
    ) -> Result<LineUpdate, CartServiceError> {
        if quantity < 0 {
            return Err(CartServiceError::ValidationError(
                "quantity must not be negative".to_string(),
            ));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(quantity_too_large());
        }

        let (cart, line) = self.owned_line(user_id, line_id).await?;

        if quantity == 0 {
            self.carts.delete_line(line.id).await.context("Failed to remove cart item")?;
            return Ok(LineUpdate::Removed);
        }

        self.carts
            .set_line_quantity(line.id, quantity)
            .await
            .context("Failed to update cart item")?;
        Ok(LineUpdate::Updated(self.view(cart).await?))
    }

    pub async fn remove_line(&self, user_id: i64, line_id: i64) -> Result<(), CartServiceError> {
        let (_, line) = self.owned_line(user_id, line_id).await?;
        self.carts.delete_line(line.id).await.context("Failed to remove cart item")?;
        Ok(())
    }

    /// Empty the user's cart. Returns false when the user has no cart yet.
    pub async fn clear(&self, user_id: i64) -> Result<bool, CartServiceError> {
        match self.carts.find_by_user(user_id).await.context("Failed to get cart")? {
            Some(cart) => {
                self.carts.clear(cart.id).await.context("Failed to clear cart")?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn owned_line(
        &self,
        user_id: i64,
        line_id: i64,
    ) -> Result<(Cart, CartLine), CartServiceError> {
        let line = self
            .carts
            .get_line(line_id)
            .await
            .context("Failed to get cart item")?
            .ok_or(CartServiceError::LineNotFound)?;
        let cart = self
            .carts
            .find_by_id(line.cart_id)
            .await
            .context("Failed to get cart")?
            .ok_or(CartServiceError::LineNotFound)?;

        if cart.user_id != user_id {
            return Err(CartServiceError::Forbidden);
        }
        Ok((cart, line))
    }

    async fn view(&self, cart: Cart) -> Result<CartView, CartServiceError> {
        let lines = self
            .carts
            .lines_with_items(cart.id)
            .await
            .context("Failed to load cart items")?;
        Ok(CartView { cart, lines })
    }
}
