//! Cart persistence.

mod memory;
mod postgres;

pub use memory::InMemoryCartStore;
pub use postgres::PostgresCartStore;

use async_trait::async_trait;
use common::CartId;

use crate::error::Result;
use crate::model::{Cart, NewCart};

/// Storage for carts.
///
/// All implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns every cart, ordered by id.
    async fn list(&self) -> Result<Vec<Cart>>;

    /// Loads a cart, or `None` if it does not exist.
    async fn get(&self, id: CartId) -> Result<Option<Cart>>;

    /// Persists a new INITIATED cart and returns it with its assigned id.
    async fn add(&self, cart: NewCart) -> Result<Cart>;

    /// Replaces a stored cart wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] if no cart has this id.
    async fn save(&self, cart: &Cart) -> Result<()>;

    /// Removes a cart. Returns `false` if it did not exist.
    async fn delete(&self, id: CartId) -> Result<bool>;
}
