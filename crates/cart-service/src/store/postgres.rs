use async_trait::async_trait;
use common::{CartId, CartStatus, CustomerId, LineItem, OrderId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::error::{Result, StoreError};
use crate::model::{Cart, NewCart};
use crate::store::CartStore;

const MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL-backed cart store.
#[derive(Clone)]
pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the embedded migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_cart(row: PgRow) -> Result<Cart> {
        let details: serde_json::Value = row.try_get("details")?;
        let details: Vec<LineItem> = serde_json::from_value(details)?;
        let status: String = row.try_get("status")?;
        let status: CartStatus = serde_json::from_value(serde_json::Value::String(status))?;

        Ok(Cart {
            cart_id: CartId::new(row.try_get("cart_id")?),
            details,
            total: row.try_get("total")?,
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            status,
            order_id: row
                .try_get::<Option<i64>, _>("order_id")?
                .map(OrderId::new),
        })
    }
}

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn list(&self) -> Result<Vec<Cart>> {
        let rows = sqlx::query(
            r#"
            SELECT cart_id, details, total, customer_id, status, order_id
            FROM carts
            ORDER BY cart_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart).collect()
    }

    async fn get(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query(
            r#"
            SELECT cart_id, details, total, customer_id, status, order_id
            FROM carts
            WHERE cart_id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_cart).transpose()
    }

    async fn add(&self, cart: NewCart) -> Result<Cart> {
        let details = serde_json::to_value(&cart.details)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO carts (details, total, customer_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING cart_id
            "#,
        )
        .bind(details)
        .bind(cart.total)
        .bind(cart.customer_id.as_str())
        .bind(CartStatus::Initiated.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(Cart::initiated(CartId::new(id), cart))
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let details = serde_json::to_value(&cart.details)?;

        let result = sqlx::query(
            r#"
            UPDATE carts
            SET details = $2, total = $3, customer_id = $4, status = $5, order_id = $6
            WHERE cart_id = $1
            "#,
        )
        .bind(cart.cart_id.as_i64())
        .bind(details)
        .bind(cart.total)
        .bind(cart.customer_id.as_str())
        .bind(cart.status.as_str())
        .bind(cart.order_id.map(|id| id.as_i64()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(cart.cart_id));
        }
        Ok(())
    }

    async fn delete(&self, id: CartId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE cart_id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
