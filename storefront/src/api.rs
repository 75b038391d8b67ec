use crate::callback::{CallbackProcessor, PaymentNotification};
use crate::gateway::PaymentGateway;
use crate::model::CreateOrderRequest;
use crate::orders::{OrderService, ServiceError};
use crate::storage::BoxError;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use common::config::BackendConfig;
use http::header;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error};
use uuid::Uuid;

pub fn initialize_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub callbacks: Arc<CallbackProcessor>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub admin_key: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/user/{user_id}", get(orders_by_user))
        .route("/orders/guest/{email}", get(guest_orders))
        .route("/orders/ref/{reference}", get(order_by_reference))
        .route("/orders/{id}", get(order_by_id))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/admin/orders", get(all_orders))
        .route("/checkout", post(checkout))
        .route("/payment/callback", post(payment_callback))
        .route("/health", get(health_check))
        .with_state(state)
}

pub async fn run_backend(config: &BackendConfig, state: AppState) -> Result<(), BoxError> {
    let app = router(state).layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(config.cors_origin.parse::<header::HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    tracing::info!("Starting backend service at {}", config.server_address);
    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn error_body(message: impl Into<String>) -> Json<serde_json::Value> {
    Json(json!({ "error": message.into() }))
}

fn service_error_response(e: ServiceError) -> Response {
    match e {
        ServiceError::Validation(msg) => (StatusCode::BAD_REQUEST, error_body(msg)).into_response(),
        ServiceError::NotFound(what) => {
            (StatusCode::NOT_FOUND, error_body(format!("{what} not found"))).into_response()
        }
        ServiceError::Storage(e) => {
            error!(error = %e, "Storage failure while handling request");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("internal server error"),
            )
                .into_response()
        }
    }
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let supplied = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.admin_key.is_empty() || supplied != state.admin_key {
        return Err((StatusCode::UNAUTHORIZED, error_body("unauthorized")).into_response());
    }
    Ok(())
}

async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Response {
    match state.orders.create_order(request).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn orders_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Response {
    match state.orders.orders_for_account(user_id).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn guest_orders(State(state): State<AppState>, Path(email): Path<String>) -> Response {
    match state.orders.guest_orders_by_email(&email).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn order_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Response {
    match state.orders.order_by_reference(&reference).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn order_by_id(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.orders.order_by_id(id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => service_error_response(e),
    }
}

async fn all_orders(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.orders.all_orders().await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => service_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<UpdateStatusRequest>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }
    match state.orders.update_status(id, &request.status).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => service_error_response(e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub client_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_id: Option<String>,
}

/// Creates the pending order, then asks the payment provider for a hosted
/// checkout session the client is redirected to.
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Response {
    let order = match state.orders.create_order(request).await {
        Ok(order) => order,
        Err(e) => return service_error_response(e),
    };
    match state.gateway.initiate_checkout(&order).await {
        Ok(session) => Json(CheckoutResponse {
            checkout_url: session.checkout_url,
            client_reference: order.client_reference,
            checkout_id: session.checkout_id,
        })
        .into_response(),
        Err(e) => {
            error!(
                error = %e,
                client_reference = %order.client_reference,
                "Checkout initiation failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                error_body("checkout initiation failed"),
            )
                .into_response()
        }
    }
}

/// Always acknowledges with 200 once the payload parsed; a non-success
/// response here would trigger a provider-side retry storm.
async fn payment_callback(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Response {
    let outcome = state.callbacks.process(&notification).await;
    debug!(?outcome, "Payment callback acknowledged");
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}
