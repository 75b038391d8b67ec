use crate::emails;
use crate::model::{Order, OrderStatus};
use crate::notify::Notifier;
use crate::storage::{OrderStorage, PaymentEventStorage, ProductStorage};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Hubtel delivers the correlation token and status both nested under
/// `Data` and, for some event kinds, at the top level.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "Data", default)]
    pub data: Option<NotificationData>,
    #[serde(rename = "clientReference", default)]
    pub client_reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    #[serde(rename = "ClientReference", default)]
    pub client_reference: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "CheckoutId", default)]
    pub checkout_id: Option<String>,
}

impl PaymentNotification {
    pub fn reference(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.client_reference.as_deref())
            .or(self.client_reference.as_deref())
    }

    pub fn provider_status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.status.as_deref()))
    }
}

/// Maps the provider's status vocabulary to the internal one. Unmapped
/// statuses return `None` and leave the order pending.
pub fn map_provider_status(raw: &str) -> Option<OrderStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "success" | "paid" => Some(OrderStatus::Paid),
        "failed" => Some(OrderStatus::Failed),
        "cancelled" | "canceled" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

/// What a callback delivery did, for logging and tests. The HTTP response
/// to the provider is a success acknowledgment in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Applied(OrderStatus),
    Duplicate,
    Ignored,
}

/// Processes asynchronous payment notifications. Never returns an error:
/// the provider must see a success acknowledgment once the payload parsed,
/// or it will retry; internal failures are logged only.
pub struct CallbackProcessor {
    orders: Arc<dyn OrderStorage>,
    products: Arc<dyn ProductStorage>,
    events: Arc<dyn PaymentEventStorage>,
    notifier: Arc<dyn Notifier>,
}

impl CallbackProcessor {
    pub fn new(
        orders: Arc<dyn OrderStorage>,
        products: Arc<dyn ProductStorage>,
        events: Arc<dyn PaymentEventStorage>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orders,
            products,
            events,
            notifier,
        }
    }

    pub async fn process(&self, notification: &PaymentNotification) -> CallbackOutcome {
        let Some(reference) = notification.reference() else {
            warn!("Payment callback without a client reference");
            return CallbackOutcome::Ignored;
        };
        let Some(raw_status) = notification.provider_status() else {
            warn!(reference, "Payment callback without a status");
            return CallbackOutcome::Ignored;
        };
        let Some(target) = map_provider_status(raw_status) else {
            info!(
                reference,
                provider_status = raw_status,
                "Unmapped provider status, order left pending"
            );
            return CallbackOutcome::Ignored;
        };

        let order = match self.orders.order_by_reference(reference).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                // Test callbacks and stale references must not trigger
                // provider-side retries.
                info!(
                    reference,
                    "Callback for unknown client reference, acknowledged without action"
                );
                return CallbackOutcome::Ignored;
            }
            Err(e) => {
                error!(error = %e, reference, "Order lookup failed during callback");
                return CallbackOutcome::Ignored;
            }
        };

        match target {
            OrderStatus::Paid => self.apply_paid(&order).await,
            other => self.apply_outcome(&order, other).await,
        }
    }

    /// Stock decrement and confirmation dispatch happen only on the first
    /// observed transition into `Paid` for a given reference. The transition
    /// is persisted before the payment event is recorded: a failed status
    /// write leaves nothing recorded, so the provider's retry can re-apply
    /// instead of being suppressed with the order stranded pending.
    async fn apply_paid(&self, order: &Order) -> CallbackOutcome {
        if order.status == OrderStatus::Paid {
            debug!(
                client_reference = %order.client_reference,
                "Duplicate payment confirmation suppressed"
            );
            return CallbackOutcome::Duplicate;
        }

        if let Err(e) = self.orders.set_status(order.id, OrderStatus::Paid).await {
            error!(
                error = %e,
                client_reference = %order.client_reference,
                "Failed to persist paid status, awaiting provider retry"
            );
            return CallbackOutcome::Ignored;
        }

        // Concurrent deliveries can both observe the order pending; the
        // event record decides which one runs the side effects.
        let first = match self
            .events
            .record_processed(&order.client_reference, OrderStatus::Paid)
            .await
        {
            Ok(first) => first,
            Err(e) => {
                error!(
                    error = %e,
                    client_reference = %order.client_reference,
                    "Could not record payment event, skipping stock and mail"
                );
                return CallbackOutcome::Applied(OrderStatus::Paid);
            }
        };
        if !first {
            debug!(
                client_reference = %order.client_reference,
                "Duplicate payment confirmation suppressed"
            );
            return CallbackOutcome::Duplicate;
        }

        for item in &order.items {
            match self
                .products
                .decrement_stock(&item.product_id, item.quantity)
                .await
            {
                Ok(Some(remaining)) => {
                    debug!(product_id = %item.product_id, remaining, "Stock decremented");
                }
                Ok(None) => {
                    warn!(
                        product_id = %item.product_id,
                        client_reference = %order.client_reference,
                        "Product missing during stock decrement, skipped"
                    );
                }
                Err(e) => {
                    error!(
                        error = %e,
                        product_id = %item.product_id,
                        "Stock decrement failed"
                    );
                }
            }
        }

        if let Some(email) = &order.customer.email {
            let (subject, html) = emails::payment_confirmation(order);
            if let Err(e) = self.notifier.send(email, &subject, &html).await {
                warn!(
                    error = %e,
                    client_reference = %order.client_reference,
                    "Failed to send payment confirmation"
                );
            }
        }

        info!(client_reference = %order.client_reference, "Order marked as paid");
        CallbackOutcome::Applied(OrderStatus::Paid)
    }

    async fn apply_outcome(&self, order: &Order, status: OrderStatus) -> CallbackOutcome {
        if order.status == status {
            return CallbackOutcome::Duplicate;
        }
        if !order.status.can_transition(status) {
            warn!(
                client_reference = %order.client_reference,
                from = %order.status,
                to = %status,
                "Illegal status transition from callback ignored"
            );
            return CallbackOutcome::Ignored;
        }
        if let Err(e) = self.orders.set_status(order.id, status).await {
            error!(
                error = %e,
                client_reference = %order.client_reference,
                "Failed to persist status from callback"
            );
            return CallbackOutcome::Ignored;
        }
        info!(
            client_reference = %order.client_reference,
            status = %status,
            "Order status updated from callback"
        );
        CallbackOutcome::Applied(status)
    }
}
