use crate::model::{NewOrder, Order, OrderStatus};
use async_trait::async_trait;
use std::error::Error;
use uuid::Uuid;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Persisted order records. Point lookups return `Ok(None)` for unknown
/// ids/references so callers can distinguish not-found from storage failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStorage: Send + Sync {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, BoxError>;

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>, BoxError>;

    async fn order_by_reference(&self, reference: &str) -> Result<Option<Order>, BoxError>;

    /// Orders bound to an account, newest first.
    async fn orders_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, BoxError>;

    /// Orders with no account binding whose customer email matches
    /// case-insensitively, newest first.
    async fn guest_orders_by_email(&self, email: &str) -> Result<Vec<Order>, BoxError>;

    async fn all_orders(&self) -> Result<Vec<Order>, BoxError>;

    async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<(), BoxError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStorage: Send + Sync {
    /// Atomically decrements stock, clamped at zero. Returns the remaining
    /// stock, or `None` when no such product exists.
    async fn decrement_stock(&self, product_id: &str, quantity: u32)
    -> Result<Option<i32>, BoxError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStorage: Send + Sync {
    async fn account_exists(&self, account_id: Uuid) -> Result<bool, BoxError>;
}

/// Processed payment events, keyed by `(client_reference, target status)`.
/// Providers retry webhooks; side effects are applied only when a delivery
/// is the first one observed for its key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentEventStorage: Send + Sync {
    /// Records the event and reports whether it was seen for the first time.
    async fn record_processed(
        &self,
        client_reference: &str,
        status: OrderStatus,
    ) -> Result<bool, BoxError>;
}
