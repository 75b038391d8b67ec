use common::config::GatewayConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use storefront::gateway::{HubtelClient, PaymentGateway};
use storefront::model::{CustomerDetails, DeliveryMethod, Order, OrderItem, OrderStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Serves one canned HTTP response per accepted connection, counting hits.
/// Connections are closed after each response so every attempt from the
/// client arrives as a fresh accept.
async fn spawn_provider(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let api_url = format!("http://{}/initiate", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (api_url, hits)
}

/// Reads until the request headers and the Content-Length body are in.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..header_end]);
        let content_length = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        if buf.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

fn config(api_url: String, max_attempts: u32) -> GatewayConfig {
    GatewayConfig {
        api_url,
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        merchant_account: "12345".to_string(),
        callback_url: "https://api.example.com/payment/callback".to_string(),
        return_url: "https://shop.example.com/track-order".to_string(),
        cancellation_url: "https://shop.example.com/checkout".to_string(),
        country_prefix: "233".to_string(),
        timeout_secs: 5,
        max_attempts,
    }
}

fn order() -> Order {
    Order {
        id: Uuid::new_v4(),
        client_reference: "REF-RETRY-1".to_string(),
        user_id: None,
        items: vec![OrderItem {
            product_id: "p1".to_string(),
            name: "Straight 18\"".to_string(),
            unit_price: 100.0,
            quantity: 2,
            selected_variant: None,
        }],
        total: 200.0,
        status: OrderStatus::Pending,
        customer: CustomerDetails {
            name: Some("Ama".to_string()),
            email: Some("ama@example.com".to_string()),
            phone: Some("0241234567".to_string()),
            address: None,
        },
        delivery_method: DeliveryMethod::Delivery,
        created_at: chrono::Utc::now(),
    }
}

const SUCCESS_BODY: &str =
    r#"{"data": {"checkoutUrl": "https://pay.hubtel.com/abc", "checkoutId": "c1"}}"#;

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let (api_url, hits) = spawn_provider(vec![
        (500, r#"{"message": "upstream glitch"}"#),
        (200, SUCCESS_BODY),
    ])
    .await;
    let client = HubtelClient::new(config(api_url, 3)).unwrap();

    let session = client.initiate_checkout(&order()).await.unwrap();
    assert_eq!(session.checkout_url, "https://pay.hubtel.com/abc");
    assert_eq!(session.checkout_id.as_deref(), Some("c1"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let (api_url, hits) = spawn_provider(vec![
        (400, r#"{"message": "invalid merchant"}"#),
        (200, SUCCESS_BODY),
    ])
    .await;
    let client = HubtelClient::new(config(api_url, 3)).unwrap();

    assert!(client.initiate_checkout(&order()).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_stop_at_the_configured_attempt_limit() {
    let (api_url, hits) = spawn_provider(vec![
        (503, r#"{"message": "down"}"#),
        (503, r#"{"message": "down"}"#),
        (200, SUCCESS_BODY),
    ])
    .await;
    let client = HubtelClient::new(config(api_url, 2)).unwrap();

    assert!(client.initiate_checkout(&order()).await.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
