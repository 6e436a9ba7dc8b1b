//! Order service
//!
//! Checkout turns the caller's cart into an order. Every line's item name and
//! price is copied into the order at that moment, and the cart is emptied in
//! the same transaction as the order is written.

use crate::db::repositories::{CartRepository, OrderRepository};
use crate::models::{ListParams, NewOrderLine, OrderStatus, OrderWithLines, PagedResult};
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;

const NOTE_MAX: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cart not found")]
    CartNotFound,

    #[error("Order not found")]
    NotFound,

    /// Acting on another user's cart or order
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Cart is empty")]
    EmptyCart,

    /// The cart was modified between reading it and placing the order
    #[error("Cart changed during checkout, please try again")]
    CartChanged,

    /// A cart line refers to an item that no longer resolves
    #[error("Invalid item in cart")]
    InvalidLine,

    #[error("Invalid order status")]
    InvalidStatus,

    #[error("Cannot cancel order with status: {0}")]
    InvalidState(OrderStatus),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartRepository>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, carts: Arc<dyn CartRepository>) -> Self {
        Self { orders, carts }
    }

    /// Place an order from the caller's cart.
    pub async fn checkout(
        &self,
        user_id: i64,
        cart_id: i64,
        note: Option<String>,
    ) -> Result<OrderWithLines, OrderServiceError> {
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if note.as_ref().is_some_and(|n| n.chars().count() > NOTE_MAX) {
            return Err(OrderServiceError::ValidationError(format!(
                "note must be at most {} characters",
                NOTE_MAX
            )));
        }

        let cart = self
            .carts
            .find_by_id(cart_id)
            .await
            .context("Failed to get cart")?
            .ok_or(OrderServiceError::CartNotFound)?;
        if cart.user_id != user_id {
            return Err(OrderServiceError::Forbidden("Not authorized to checkout this cart"));
        }

        let lines = self
            .carts
            .lines_with_items(cart.id)
            .await
            .context("Failed to load cart items")?;
        if lines.is_empty() {
            return Err(OrderServiceError::EmptyCart);
        }

        let snapshot = lines
            .iter()
            .map(|line| {
                let item = line.item.as_ref().ok_or(OrderServiceError::InvalidLine)?;
                Ok(NewOrderLine {
                    cart_line_id: line.line.id,
                    item_id: item.id,
                    item_name: item.name.clone(),
                    item_price: item.price,
                    quantity: line.line.quantity,
                })
            })
            .collect::<Result<Vec<_>, OrderServiceError>>()?;

        let order = self
            .orders
            .place_from_cart(user_id, cart.id, note.as_deref(), &snapshot)
            .await
            .context("Failed to place order")?
            .ok_or(OrderServiceError::CartChanged)?;

        tracing::info!(
            user_id,
            order_id = order.order.id,
            total = order.order.total_amount,
            "Order placed"
        );
        Ok(order)
    }

    pub async fn list(
        &self,
        params: ListParams,
    ) -> Result<PagedResult<OrderWithLines>, OrderServiceError> {
        let (orders, total) = self.orders.list(&params).await.context("Failed to list orders")?;
        Ok(PagedResult::new(orders, total, &params))
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<OrderWithLines>, OrderServiceError> {
        Ok(self
            .orders
            .list_by_user(user_id)
            .await
            .context("Failed to list orders")?)
    }

    /// Get one of the caller's orders
    pub async fn get(&self, user_id: i64, id: i64) -> Result<OrderWithLines, OrderServiceError> {
        let order = self.find(id).await?;
        if order.order.user_id != user_id {
            return Err(OrderServiceError::Forbidden("Not authorized to view this order"));
        }
        Ok(order)
    }

    /// Set any of the known statuses. No transition rules apply here.
    pub async fn update_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<OrderWithLines, OrderServiceError> {
        let status = OrderStatus::from_str(status).map_err(|_| OrderServiceError::InvalidStatus)?;
        self.find(id).await?;

        self.orders
            .update_status(id, status)
            .await
            .context("Failed to update order status")?;

        tracing::info!(order_id = id, %status, "Order status updated");
        self.find(id).await
    }

    /// Cancel one of the caller's orders. Only pending or confirmed orders can be cancelled.
    pub async fn cancel(&self, user_id: i64, id: i64) -> Result<OrderWithLines, OrderServiceError> {
        let order = self.find(id).await?;
        if order.order.user_id != user_id {
            return Err(OrderServiceError::Forbidden("Not authorized to cancel this order"));
        }
        if !order.order.status.is_cancellable() {
            return Err(OrderServiceError::InvalidState(order.order.status));
        }

        self.orders
            .update_status(id, OrderStatus::Cancelled)
            .await
            .context("Failed to cancel order")?;

        tracing::info!(user_id, order_id = id, "Order cancelled");
        self.find(id).await
    }

    async fn find(&self, id: i64) -> Result<OrderWithLines, OrderServiceError> {
        self.orders
            .get_by_id(id)
            .await
            .context("Failed to get order")?
            .ok_or(OrderServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ItemRepository, SqlxCartRepository, SqlxItemRepository, SqlxOrderRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateItemInput, Item, User};

    pub(crate) struct Fixture {
        pub service: OrderService,
        pub carts: Arc<dyn CartRepository>,
        pub items: Arc<dyn ItemRepository>,
        pub alice: i64,
        pub bob: i64,
    }

    pub(crate) async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::new(pool.clone());
        let alice = users
            .create(&User::new("alice".into(), String::new(), "hash".into()))
            .await
            .unwrap();
        let bob = users
            .create(&User::new("bob".into(), String::new(), "hash".into()))
            .await
            .unwrap();
        let carts = SqlxCartRepository::boxed(pool.clone());

        Fixture {
            service: OrderService::new(SqlxOrderRepository::boxed(pool.clone()), carts.clone()),
            carts,
            items: SqlxItemRepository::boxed(pool),
            alice: alice.id,
            bob: bob.id,
        }
    }

    /// Put `qty` of a new item priced `price` in the user's cart; returns (cart id, item)
    pub(crate) async fn fill_cart(f: &Fixture, user_id: i64, price: f64, qty: i64) -> (i64, Item) {
        let item = f
            .items
            .create(&CreateItemInput::new(format!("item-{}", price), price))
            .await
            .unwrap();
        let cart = f.carts.get_or_create(user_id).await.unwrap();
        f.carts.add_line(cart.id, item.id, qty).await.unwrap();
        (cart.id, item)
    }

    #[tokio::test]
    async fn test_checkout() {
        let f = setup().await;
        let (cart_id, item) = fill_cart(&f, f.alice, 10.0, 2).await;

        let order = f
            .service
            .checkout(f.alice, cart_id, Some("gift wrap".to_string()))
            .await
            .expect("Checkout should succeed");

        assert_eq!(order.order.status, OrderStatus::Confirmed);
        assert_eq!(order.order.total_amount, 20.0);
        assert_eq!(order.order.note.as_deref(), Some("gift wrap"));
        assert_eq!(order.lines[0].item_name, item.name);
        assert_eq!(order.lines[0].item_price, 10.0);
        assert!(f.carts.lines_with_items(cart_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_errors() {
        let f = setup().await;
        let (cart_id, item) = fill_cart(&f, f.alice, 10.0, 1).await;
        let bob_cart = f.carts.get_or_create(f.bob).await.unwrap();

        assert!(matches!(
            f.service.checkout(f.alice, 999, None).await,
            Err(OrderServiceError::CartNotFound)
        ));
        assert!(matches!(
            f.service.checkout(f.bob, cart_id, None).await,
            Err(OrderServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.checkout(f.bob, bob_cart.id, None).await,
            Err(OrderServiceError::EmptyCart)
        ));
        assert!(matches!(
            f.service.checkout(f.alice, cart_id, Some("x".repeat(501))).await,
            Err(OrderServiceError::ValidationError(_))
        ));

        f.items.soft_delete(item.id).await.unwrap();
        assert!(matches!(
            f.service.checkout(f.alice, cart_id, None).await,
            Err(OrderServiceError::InvalidLine)
        ));
        assert_eq!(f.carts.lines_with_items(cart_id).await.unwrap().len(), 1);
        assert!(f.service.list_for_user(f.alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_checks_owner() {
        let f = setup().await;
        let (cart_id, _) = fill_cart(&f, f.alice, 5.0, 1).await;
        let order = f.service.checkout(f.alice, cart_id, None).await.unwrap();

        assert!(f.service.get(f.alice, order.order.id).await.is_ok());
        assert!(matches!(
            f.service.get(f.bob, order.order.id).await,
            Err(OrderServiceError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.get(f.alice, 999).await,
            Err(OrderServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_status() {
        let f = setup().await;
        let (cart_id, _) = fill_cart(&f, f.alice, 5.0, 1).await;
        let order = f.service.checkout(f.alice, cart_id, None).await.unwrap();

        let shipped = f
            .service
            .update_status(order.order.id, "shipped")
            .await
            .expect("Status update should succeed");
        assert_eq!(shipped.order.status, OrderStatus::Shipped);

        assert!(matches!(
            f.service.update_status(order.order.id, "lost").await,
            Err(OrderServiceError::InvalidStatus)
        ));
        assert!(matches!(
            f.service.update_status(999, "shipped").await,
            Err(OrderServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_cancel() {
        let f = setup().await;
        let (cart_id, _) = fill_cart(&f, f.alice, 5.0, 1).await;
        let order = f.service.checkout(f.alice, cart_id, None).await.unwrap();

        assert!(matches!(
            f.service.cancel(f.bob, order.order.id).await,
            Err(OrderServiceError::Forbidden(_))
        ));

        let cancelled = f.service.cancel(f.alice, order.order.id).await.unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);

        match f.service.cancel(f.alice, order.order.id).await {
            Err(e @ OrderServiceError::InvalidState(OrderStatus::Cancelled)) => {
                assert_eq!(e.to_string(), "Cannot cancel order with status: cancelled");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let f = setup().await;
        for price in [1.0, 2.0, 3.0] {
            let (cart_id, _) = fill_cart(&f, f.alice, price, 1).await;
            f.service.checkout(f.alice, cart_id, None).await.unwrap();
        }

        let page = f.service.list(ListParams::new(Some(1), Some(2))).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 2);
        assert_eq!(page.items[0].order.total_amount, 3.0);
    }
}

#[cfg(test)]
mod property_tests {
    use super::tests::{fill_cart, setup};
    use crate::models::CreateItemInput;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// After checkout the cart is empty and exactly one order exists whose
        /// lines sum to the cart's pre-checkout total.
        #[test]
        fn property_checkout_moves_cart_into_one_order(
            lines in prop::collection::vec((1u32..10_000, 1i64..10), 1..5)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let f = setup().await;
                let cart = f.carts.get_or_create(f.alice).await.unwrap();
                for (idx, (cents, qty)) in lines.iter().enumerate() {
                    let item = f.items
                        .create(&CreateItemInput::new(format!("item-{}", idx), *cents as f64 / 100.0))
                        .await
                        .unwrap();
                    f.carts.add_line(cart.id, item.id, *qty).await.unwrap();
                }
                let before: f64 = f.carts.lines_with_items(cart.id).await.unwrap()
                    .iter()
                    .map(|l| l.subtotal())
                    .sum();

                let order = f.service.checkout(f.alice, cart.id, None).await.unwrap();

                prop_assert!(f.carts.lines_with_items(cart.id).await.unwrap().is_empty());
                prop_assert_eq!(f.service.list_for_user(f.alice).await.unwrap().len(), 1);
                let line_sum: f64 = order.lines.iter().map(|l| l.subtotal).sum();
                prop_assert!((line_sum - before).abs() < 1e-6);
                prop_assert!((order.order.total_amount - before).abs() < 1e-6);
                Ok(())
            });
            result?;
        }

        /// Repricing an item after purchase leaves the order's snapshot untouched.
        #[test]
        fn property_order_lines_are_snapshots(
            cents in 1u32..10_000,
            new_cents in 0u32..10_000,
            qty in 1i64..10
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let f = setup().await;
                let price = cents as f64 / 100.0;
                let (cart_id, mut item) = fill_cart(&f, f.alice, price, qty).await;
                let order = f.service.checkout(f.alice, cart_id, None).await.unwrap();

                item.price = new_cents as f64 / 100.0;
                item.name = "renamed".to_string();
                f.items.update(&item).await.unwrap();

                let stored = f.service.get(f.alice, order.order.id).await.unwrap();
                prop_assert_eq!(stored.lines[0].item_price, price);
                prop_assert_eq!(stored.lines[0].item_name.as_str(), order.lines[0].item_name.as_str());
                prop_assert!((stored.lines[0].subtotal - price * qty as f64).abs() < 1e-9);
                prop_assert_eq!(stored.order.total_amount, order.order.total_amount);
                Ok(())
            });
            result?;
        }
    }
}
