use crate::model::{CustomerDetails, DeliveryMethod, NewOrder, Order, OrderStatus};
use crate::storage::{AccountStorage, BoxError, OrderStorage, PaymentEventStorage, ProductStorage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use tracing::{debug, error};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, client_reference, user_id, items, total, status, \
     customer_name, customer_email, customer_phone, customer_address, \
     delivery_method, created_at";

/// Postgres-backed storage for orders, products and processed payment
/// events, sharing one connection pool. The schema itself is owned by the
/// managed database; `migrations/0001_init.sql` documents the expected shape.
#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
}

impl PgStorage {
    pub async fn new(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, BoxError> {
    let status_raw: String = row.try_get("status")?;
    let status = OrderStatus::from_str(&status_raw)
        .map_err(|_| format!("unrecognized status '{status_raw}' in orders row"))?;
    let delivery_raw: String = row.try_get("delivery_method")?;
    let delivery_method = DeliveryMethod::from_str(&delivery_raw)
        .map_err(|_| format!("unrecognized delivery method '{delivery_raw}' in orders row"))?;
    let items: Json<Vec<crate::model::OrderItem>> = row.try_get("items")?;

    Ok(Order {
        id: row.try_get("id")?,
        client_reference: row.try_get("client_reference")?,
        user_id: row.try_get("user_id")?,
        items: items.0,
        total: row.try_get("total")?,
        status,
        customer: CustomerDetails {
            name: row.try_get("customer_name")?,
            email: row.try_get("customer_email")?,
            phone: row.try_get("customer_phone")?,
            address: row.try_get("customer_address")?,
        },
        delivery_method,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl OrderStorage for PgStorage {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, BoxError> {
        debug!(
            client_reference = %order.client_reference,
            "Inserting order record"
        );
        let sql = format!(
            "INSERT INTO orders (client_reference, user_id, items, total, status, \
             customer_name, customer_email, customer_phone, customer_address, delivery_method) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&order.client_reference)
            .bind(order.user_id)
            .bind(Json(&order.items))
            .bind(order.total)
            .bind(order.status.to_string())
            .bind(&order.customer.name)
            .bind(&order.customer.email)
            .bind(&order.customer.phone)
            .bind(&order.customer.address)
            .bind(order.delivery_method.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to insert order record");
                e
            })?;
        order_from_row(&row)
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, BoxError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>, BoxError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE client_reference = $1");
        let row = sqlx::query(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn orders_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, BoxError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn guest_orders_by_email(&self, email: &str) -> Result<Vec<Order>, BoxError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id IS NULL AND lower(customer_email) = lower($1) \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql).bind(email).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn all_orders(&self) -> Result<Vec<Order>, BoxError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<(), BoxError> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(format!("order {id} not found for status update").into());
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStorage for PgStorage {
    async fn decrement_stock(
        &self,
        product_id: &str,
        quantity: u32,
    ) -> Result<Option<i32>, BoxError> {
        // Single statement so concurrent callbacks cannot lose updates on a
        // read-modify-write sequence; GREATEST keeps stock from going
        // negative.
        let row = sqlx::query(
            "UPDATE products SET stock = GREATEST(stock - $2, 0) WHERE id = $1 RETURNING stock",
        )
        .bind(product_id)
        .bind(quantity as i32)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get("stock")).transpose()?)
    }
}

#[async_trait]
impl AccountStorage for PgStorage {
    async fn account_exists(&self, account_id: Uuid) -> Result<bool, BoxError> {
        let row = sqlx::query("SELECT id FROM users WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl PaymentEventStorage for PgStorage {
    async fn record_processed(
        &self,
        client_reference: &str,
        status: OrderStatus,
    ) -> Result<bool, BoxError> {
        let row = sqlx::query(
            "INSERT INTO payment_events (client_reference, status) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING RETURNING client_reference",
        )
        .bind(client_reference)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}
