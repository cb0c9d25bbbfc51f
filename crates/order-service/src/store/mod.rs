//! Order persistence.

mod memory;
mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;

use async_trait::async_trait;
use common::{CartId, OrderId};

use crate::error::Result;
use crate::model::{NewOrder, Order};

/// Result of [`OrderStore::add`].
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// A new order was stored.
    Created(Order),
    /// The cart already had an order; nothing was written.
    Existing(Order),
}

impl AddOutcome {
    pub fn order(&self) -> &Order {
        match self {
            AddOutcome::Created(order) | AddOutcome::Existing(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            AddOutcome::Created(order) | AddOutcome::Existing(order) => order,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, AddOutcome::Created(_))
    }
}

/// Storage for orders, keyed by order id and unique per cart.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stores `order` unless its cart already has one, in which case the
    /// existing order is returned untouched.
    async fn add(&self, order: NewOrder) -> Result<AddOutcome>;

    /// Replaces a stored order wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if no order has this id.
    async fn save(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Finds the order created for `cart_id`, if any.
    async fn find_by_cart(&self, cart_id: CartId) -> Result<Option<Order>>;

    /// Returns every order, ordered by id.
    async fn list(&self) -> Result<Vec<Order>>;
}
