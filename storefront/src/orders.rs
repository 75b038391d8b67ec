use crate::emails;
use crate::model::{
    CreateOrderRequest, DeliveryMethod, NewOrder, Order, OrderStatus, generate_client_reference,
};
use crate::notify::Notifier;
use crate::storage::{AccountStorage, BoxError, OrderStorage};
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("storage failure: {0}")]
    Storage(#[from] BoxError),
}

/// Validates and persists orders, answers lookups, and drives the admin
/// status-transition path. Collaborators are injected so tests can run
/// against in-memory doubles.
pub struct OrderService {
    orders: Arc<dyn OrderStorage>,
    accounts: Arc<dyn AccountStorage>,
    notifier: Arc<dyn Notifier>,
    frontend_url: String,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStorage>,
        accounts: Arc<dyn AccountStorage>,
        notifier: Arc<dyn Notifier>,
        frontend_url: String,
    ) -> Self {
        Self {
            orders,
            accounts,
            notifier,
            frontend_url,
        }
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ServiceError> {
        request.validate().map_err(ServiceError::Validation)?;

        let user_id = self.resolve_account(request.user_id.as_deref()).await;
        let client_reference = request
            .client_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_client_reference(Utc::now()));

        let new_order = NewOrder {
            client_reference,
            user_id,
            items: request.items,
            total: request.total,
            customer: request.customer,
            delivery_method: request.delivery_method.unwrap_or(DeliveryMethod::Delivery),
            status: OrderStatus::Pending,
        };

        let order = self.orders.insert_order(&new_order).await?;
        info!(
            order_id = %order.id,
            client_reference = %order.client_reference,
            guest = order.user_id.is_none(),
            "Order created"
        );

        if let Some(email) = order.customer.email.clone() {
            let (subject, html) = emails::order_confirmation(&order, &self.frontend_url);
            if let Err(e) = self.notifier.send(&email, &subject, &html).await {
                warn!(
                    error = %e,
                    client_reference = %order.client_reference,
                    "Failed to send order confirmation"
                );
            }
        }

        Ok(order)
    }

    /// Binds the order to an account only when the supplied id parses as a
    /// UUID and names an existing account. Anything else degrades to a
    /// guest order instead of failing the request.
    async fn resolve_account(&self, raw: Option<&str>) -> Option<Uuid> {
        let raw = raw?;
        let Ok(id) = Uuid::parse_str(raw) else {
            warn!(user_id = raw, "Invalid account id format, saving as guest order");
            return None;
        };
        match self.accounts.account_exists(id).await {
            Ok(true) => Some(id),
            Ok(false) => {
                warn!(account_id = %id, "Unknown account id, saving as guest order");
                None
            }
            Err(e) => {
                warn!(
                    error = %e,
                    account_id = %id,
                    "Account lookup failed, saving as guest order"
                );
                None
            }
        }
    }

    pub async fn orders_for_account(&self, account_id: Uuid) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.orders_by_user(account_id).await?)
    }

    pub async fn guest_orders_by_email(&self, email: &str) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.guest_orders_by_email(email).await?)
    }

    pub async fn order_by_reference(&self, reference: &str) -> Result<Order, ServiceError> {
        self.orders
            .order_by_reference(reference)
            .await?
            .ok_or(ServiceError::NotFound("order"))
    }

    pub async fn order_by_id(&self, id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .order_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("order"))
    }

    pub async fn all_orders(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.all_orders().await?)
    }

    /// Admin status update. Unknown status strings and transitions back to
    /// `pending` are rejected before anything is persisted.
    pub async fn update_status(&self, id: Uuid, raw_status: &str) -> Result<Order, ServiceError> {
        let status = OrderStatus::from_str(raw_status)
            .map_err(|_| ServiceError::Validation(format!("unrecognized status '{raw_status}'")))?;

        let mut order = self
            .orders
            .order_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("order"))?;

        if !order.status.can_transition(status) {
            return Err(ServiceError::Validation(format!(
                "illegal transition from '{}' to '{}'",
                order.status, status
            )));
        }

        self.orders.set_status(id, status).await?;
        info!(order_id = %id, from = %order.status, to = %status, "Order status updated");
        order.status = status;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerDetails, OrderItem};
    use crate::notify::MockNotifier;
    use crate::storage::{MockAccountStorage, MockOrderStorage};
    use mockall::predicate::eq;

    fn request(user_id: Option<&str>) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: user_id.map(str::to_string),
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                name: "Straight 18\"".to_string(),
                unit_price: 100.0,
                quantity: 2,
                selected_variant: None,
            }],
            total: 200.0,
            customer: CustomerDetails {
                name: Some("Ama".to_string()),
                email: None,
                phone: None,
                address: None,
            },
            client_reference: None,
            delivery_method: None,
        }
    }

    fn persisted(new_order: &NewOrder) -> Order {
        Order {
            id: Uuid::new_v4(),
            client_reference: new_order.client_reference.clone(),
            user_id: new_order.user_id,
            items: new_order.items.clone(),
            total: new_order.total,
            status: new_order.status,
            customer: new_order.customer.clone(),
            delivery_method: new_order.delivery_method,
            created_at: Utc::now(),
        }
    }

    fn service(orders: MockOrderStorage, accounts: MockAccountStorage) -> OrderService {
        OrderService::new(
            Arc::new(orders),
            Arc::new(accounts),
            Arc::new(MockNotifier::new()),
            "http://localhost:5173".to_string(),
        )
    }

    #[tokio::test]
    async fn malformed_account_id_degrades_to_guest() {
        let mut orders = MockOrderStorage::new();
        orders
            .expect_insert_order()
            .withf(|o| o.user_id.is_none())
            .returning(|o| Ok(persisted(o)));
        // No account lookup happens for an unparseable id.
        let accounts = MockAccountStorage::new();

        let order = service(orders, accounts)
            .create_order(request(Some("not-a-uuid")))
            .await
            .unwrap();
        assert!(order.user_id.is_none());
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn account_lookup_failure_degrades_to_guest() {
        let account_id = Uuid::new_v4();
        let mut accounts = MockAccountStorage::new();
        accounts
            .expect_account_exists()
            .with(eq(account_id))
            .returning(|_| Err("connection refused".into()));
        let mut orders = MockOrderStorage::new();
        orders
            .expect_insert_order()
            .withf(|o| o.user_id.is_none())
            .returning(|o| Ok(persisted(o)));

        let order = service(orders, accounts)
            .create_order(request(Some(&account_id.to_string())))
            .await
            .unwrap();
        assert!(order.user_id.is_none());
    }

    #[tokio::test]
    async fn known_account_id_is_bound() {
        let account_id = Uuid::new_v4();
        let mut accounts = MockAccountStorage::new();
        accounts
            .expect_account_exists()
            .with(eq(account_id))
            .returning(|_| Ok(true));
        let mut orders = MockOrderStorage::new();
        orders
            .expect_insert_order()
            .withf(move |o| o.user_id == Some(account_id))
            .returning(|o| Ok(persisted(o)));

        let order = service(orders, accounts)
            .create_order(request(Some(&account_id.to_string())))
            .await
            .unwrap();
        assert_eq!(order.user_id, Some(account_id));
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_creation() {
        let mut orders = MockOrderStorage::new();
        orders
            .expect_insert_order()
            .returning(|o| Ok(persisted(o)));
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .returning(|_, _, _| Err("smtp down".into()));

        let service = OrderService::new(
            Arc::new(orders),
            Arc::new(MockAccountStorage::new()),
            Arc::new(notifier),
            "http://localhost:5173".to_string(),
        );

        let mut req = request(None);
        req.customer.email = Some("ama@example.com".to_string());
        assert!(service.create_order(req).await.is_ok());
    }

    #[tokio::test]
    async fn update_status_rejects_unknown_vocabulary() {
        let mut orders = MockOrderStorage::new();
        orders.expect_order_by_id().never();
        orders.expect_set_status().never();

        let result = service(orders, MockAccountStorage::new())
            .update_status(Uuid::new_v4(), "refunded")
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
