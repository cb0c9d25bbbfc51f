use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, OrderId};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::model::{NewOrder, Order};
use crate::store::{AddOutcome, OrderStore};

#[derive(Debug, Default)]
struct OrderTable {
    orders: BTreeMap<OrderId, Order>,
    last_id: i64,
    fail_on_write: bool,
}

/// In-memory order store for tests and local runs.
///
/// Enforces the one-order-per-cart rule the same way the database does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    table: Arc<RwLock<OrderTable>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `add` and `save` fail while set.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.table.write().await.fail_on_write = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.table.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn add(&self, order: NewOrder) -> Result<AddOutcome> {
        let mut table = self.table.write().await;
        if table.fail_on_write {
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }

        if let Some(existing) = table.orders.values().find(|o| o.cart_id == order.cart_id) {
            return Ok(AddOutcome::Existing(existing.clone()));
        }

        table.last_id += 1;
        let order = order.with_id(OrderId::new(table.last_id));
        table.orders.insert(order.order_id, order.clone());
        Ok(AddOutcome::Created(order))
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let mut table = self.table.write().await;
        if table.fail_on_write {
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }

        match table.orders.get_mut(&order.order_id) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(order.order_id)),
        }
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.table.read().await.orders.get(&id).cloned())
    }

    async fn find_by_cart(&self, cart_id: CartId) -> Result<Option<Order>> {
        let table = self.table.read().await;
        Ok(table.orders.values().find(|o| o.cart_id == cart_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>> {
        Ok(self.table.read().await.orders.values().cloned().collect())
    }
}
