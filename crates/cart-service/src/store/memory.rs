use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::CartId;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::model::{Cart, NewCart};
use crate::store::CartStore;

#[derive(Debug, Default)]
struct CartTable {
    carts: BTreeMap<CartId, Cart>,
    last_id: i64,
    fail_on_read: bool,
    fail_on_write: bool,
}

impl CartTable {
    fn check_read(&self) -> Result<()> {
        if self.fail_on_read {
            return Err(StoreError::Unavailable("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_on_write {
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }
        Ok(())
    }
}

/// In-memory cart store for tests and local runs.
///
/// Ids are assigned sequentially from 1, like a database sequence.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    table: Arc<RwLock<CartTable>>,
}

impl InMemoryCartStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `list` and `get` fail while set.
    pub async fn set_fail_on_read(&self, fail: bool) {
        self.table.write().await.fail_on_read = fail;
    }

    /// Makes `add`, `save` and `delete` fail while set.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.table.write().await.fail_on_write = fail;
    }

    /// Returns the number of stored carts.
    pub async fn cart_count(&self) -> usize {
        self.table.read().await.carts.len()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn list(&self) -> Result<Vec<Cart>> {
        let table = self.table.read().await;
        table.check_read()?;
        Ok(table.carts.values().cloned().collect())
    }

    async fn get(&self, id: CartId) -> Result<Option<Cart>> {
        let table = self.table.read().await;
        table.check_read()?;
        Ok(table.carts.get(&id).cloned())
    }

    async fn add(&self, cart: NewCart) -> Result<Cart> {
        let mut table = self.table.write().await;
        table.check_write()?;

        table.last_id += 1;
        let cart = Cart::initiated(CartId::new(table.last_id), cart);
        table.carts.insert(cart.cart_id, cart.clone());
        Ok(cart)
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let mut table = self.table.write().await;
        table.check_write()?;

        match table.carts.get_mut(&cart.cart_id) {
            Some(stored) => {
                *stored = cart.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(cart.cart_id)),
        }
    }

    async fn delete(&self, id: CartId) -> Result<bool> {
        let mut table = self.table.write().await;
        table.check_write()?;
        Ok(table.carts.remove(&id).is_some())
    }
}
