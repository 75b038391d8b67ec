use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Order lifecycle. Orders are created as `Pending` and move to `Paid` or
/// `Failed` on the payment callback; `Shipped`/`Completed`/`Cancelled` are
/// administrative transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// An order never returns to `Pending` once it has left it. Re-applying
    /// the current status is allowed so repeated updates stay harmless.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        match to {
            OrderStatus::Pending => self == OrderStatus::Pending,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeliveryMethod {
    Delivery,
    Pickup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    /// Externally visible correlation token shared with the payment
    /// provider; unique and stable for the life of the order.
    pub client_reference: String,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub customer: CustomerDetails,
    pub delivery_method: DeliveryMethod,
    pub created_at: DateTime<Utc>,
}

/// Client payload for creating an order. `user_id` is accepted as a raw
/// string because an invalid or unknown account id degrades to a guest
/// order rather than failing the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    #[serde(default)]
    pub customer: CustomerDetails,
    #[serde(default)]
    pub client_reference: Option<String>,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("order must contain at least one item".to_string());
        }
        if self.total <= 0.0 {
            return Err("order total must be positive".to_string());
        }
        if let Some(item) = self.items.iter().find(|i| i.quantity == 0) {
            return Err(format!("item '{}' has zero quantity", item.name));
        }
        if let Some(item) = self.items.iter().find(|i| i.unit_price < 0.0) {
            return Err(format!("item '{}' has a negative price", item.name));
        }
        let line_sum: f64 = self.items.iter().map(OrderItem::line_total).sum();
        if (line_sum - self.total).abs() > 0.01 {
            return Err(format!(
                "total {:.2} does not match line item sum {:.2}",
                self.total, line_sum
            ));
        }
        Ok(())
    }
}

/// Everything the storage layer needs to persist a new order; id and
/// creation timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub client_reference: String,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub customer: CustomerDetails,
    pub delivery_method: DeliveryMethod,
    pub status: OrderStatus,
}

/// Derives a fresh client reference: base-36 millisecond timestamp plus a
/// short random suffix so two orders placed in the same millisecond still
/// get distinct references.
pub fn generate_client_reference(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "REF-{}-{}",
        to_base36(now.timestamp_millis()).to_uppercase(),
        &suffix[..6].to_uppercase()
    )
}

fn to_base36(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
