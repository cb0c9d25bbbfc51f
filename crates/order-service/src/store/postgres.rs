use async_trait::async_trait;
use common::{CartId, CustomerId, LineItem, OrderId, OrderStatus};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::error::{Result, StoreError};
use crate::model::{NewOrder, Order};
use crate::store::{AddOutcome, OrderStore};

const MAX_CONNECTIONS: u32 = 5;

const SELECT_ORDER: &str =
    "SELECT order_id, cart_id, details, total, customer_id, status FROM orders";

/// PostgreSQL-backed order store.
///
/// The `unique_order_per_cart` constraint makes [`OrderStore::add`] safe to
/// repeat for a redelivered submission.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
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

    fn row_to_order(row: PgRow) -> Result<Order> {
        let details: serde_json::Value = row.try_get("details")?;
        let status: String = row.try_get("status")?;

        Ok(Order {
            order_id: OrderId::new(row.try_get("order_id")?),
            cart_id: CartId::new(row.try_get("cart_id")?),
            details: serde_json::from_value::<Vec<LineItem>>(details)?,
            total: row.try_get("total")?,
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            status: serde_json::from_value::<OrderStatus>(serde_json::Value::String(status))?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn add(&self, order: NewOrder) -> Result<AddOutcome> {
        let details = serde_json::to_value(&order.details)?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (cart_id, details, total, customer_id, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT unique_order_per_cart DO NOTHING
            RETURNING order_id
            "#,
        )
        .bind(order.cart_id.as_i64())
        .bind(details)
        .bind(order.total)
        .bind(order.customer_id.as_str())
        .bind(order.status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(AddOutcome::Created(order.with_id(OrderId::new(id))));
        }

        // Lost the race to an earlier delivery of the same submission.
        let cart_id = order.cart_id;
        self.find_by_cart(cart_id)
            .await?
            .map(AddOutcome::Existing)
            .ok_or_else(|| {
                StoreError::Unavailable(format!(
                    "order for cart {cart_id} conflicted but could not be read back"
                ))
            })
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let details = serde_json::to_value(&order.details)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET cart_id = $2, details = $3, total = $4, customer_id = $5, status = $6
            WHERE order_id = $1
            "#,
        )
        .bind(order.order_id.as_i64())
        .bind(order.cart_id.as_i64())
        .bind(details)
        .bind(order.total)
        .bind(order.customer_id.as_str())
        .bind(order.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(order.order_id));
        }
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE order_id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_cart(&self, cart_id: CartId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE cart_id = $1"))
            .bind(cart_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!("{SELECT_ORDER} ORDER BY order_id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}
