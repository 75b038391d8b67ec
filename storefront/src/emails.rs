//! HTML bodies for the confirmation messages sent through the
//! [`Notifier`](crate::notify::Notifier).

use crate::model::{Order, OrderItem};

fn item_list_html(items: &[OrderItem]) -> String {
    items
        .iter()
        .map(|it| {
            format!(
                "<li>{} × {} — ₵{:.2}</li>",
                it.name,
                it.quantity,
                it.line_total()
            )
        })
        .collect()
}

/// Sent right after order creation, before payment is confirmed.
pub fn order_confirmation(order: &Order, frontend_url: &str) -> (String, String) {
    let name = order.customer.name.as_deref().unwrap_or("customer");
    let reference = &order.client_reference;
    let html = format!(
        "<h2>Order Confirmation</h2>\n\
         <p>Dear {name},</p>\n\
         <p>Thank you for shopping with us! Your order has been placed successfully.</p>\n\
         <p><strong>Order Reference:</strong> {reference}</p>\n\
         <p><strong>Total:</strong> ₵{total:.2}</p>\n\
         <h3>Items:</h3>\n\
         <ul>{items}</ul>\n\
         <p>You can track your order anytime at:<br>\n\
         <a href=\"{frontend_url}/track-order?ref={reference}\">Track My Order</a></p>\n\
         <p>We'll notify you when your payment is confirmed.</p>",
        total = order.total,
        items = item_list_html(&order.items),
    );
    ("Order Confirmation".to_string(), html)
}

/// Sent once on the first confirmed payment for an order.
pub fn payment_confirmation(order: &Order) -> (String, String) {
    let name = order.customer.name.as_deref().unwrap_or("customer");
    let reference = &order.client_reference;
    let html = format!(
        "<h2>Payment Successful</h2>\n\
         <p>Dear {name},</p>\n\
         <p>We've received your payment for order <strong>{reference}</strong>.</p>\n\
         <p><strong>Total Paid:</strong> ₵{total:.2}</p>\n\
         <h3>Items:</h3>\n\
         <ul>{items}</ul>\n\
         <p>Thank you for shopping with us!</p>",
        total = order.total,
        items = item_list_html(&order.items),
    );
    ("Payment Confirmed".to_string(), html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerDetails, DeliveryMethod, OrderStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            client_reference: "REF-TEST-1".to_string(),
            user_id: None,
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                name: "Body Wave 20\"".to_string(),
                unit_price: 150.0,
                quantity: 2,
                selected_variant: Some("20\"".to_string()),
            }],
            total: 300.0,
            status: OrderStatus::Pending,
            customer: CustomerDetails {
                name: Some("Ama".to_string()),
                email: Some("ama@example.com".to_string()),
                phone: None,
                address: None,
            },
            delivery_method: DeliveryMethod::Delivery,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn order_confirmation_links_to_tracking_page() {
        let (subject, html) = order_confirmation(&order(), "https://shop.example.com");
        assert_eq!(subject, "Order Confirmation");
        assert!(html.contains("https://shop.example.com/track-order?ref=REF-TEST-1"));
        assert!(html.contains("₵300.00"));
        assert!(html.contains("Body Wave 20\" × 2"));
    }

    #[test]
    fn payment_confirmation_names_the_reference() {
        let (subject, html) = payment_confirmation(&order());
        assert_eq!(subject, "Payment Confirmed");
        assert!(html.contains("REF-TEST-1"));
        assert!(html.contains("₵300.00"));
    }
}
