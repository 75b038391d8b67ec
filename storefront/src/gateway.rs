use crate::model::Order;
use crate::storage::BoxError;
use async_trait::async_trait;
use common::config::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};
use url::Url;

/// Every failure mode of a checkout initiation collapses into this one
/// error; the caller re-submits manually.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("checkout initiation failed: {0}")]
    InitiationFailed(String),
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub checkout_id: Option<String>,
}

/// Translates an internal order into a provider-hosted checkout session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_checkout(&self, order: &Order) -> Result<CheckoutSession, GatewayError>;
}

/// Replaces a leading local-trunk zero with the configured country prefix
/// and strips a leading `+`, as the provider expects bare international
/// MSISDNs.
pub fn normalize_msisdn(phone: &str, country_prefix: &str) -> String {
    let digits: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if let Some(rest) = digits.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("{country_prefix}{rest}")
    } else {
        digits
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiatePayload {
    total_amount: String,
    description: String,
    callback_url: String,
    return_url: String,
    cancellation_url: String,
    merchant_account_number: String,
    client_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payee_mobile_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payee_email: Option<String>,
    payment_method: String,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    #[serde(default)]
    data: Option<InitiateData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitiateData {
    // The provider has been observed returning both spellings.
    #[serde(rename = "checkoutUrl", alias = "checkouturl", default)]
    checkout_url: Option<String>,
    #[serde(rename = "checkoutId", default)]
    checkout_id: Option<String>,
}

enum AttemptError {
    /// Network failure or 5xx; worth another attempt.
    Retryable(String),
    /// Provider rejected the request; retrying will not help.
    Fatal(String),
}

/// Hubtel checkout client. Basic auth over service credentials, bounded
/// request timeout, and bounded retries with backoff for transient failures.
pub struct HubtelClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl HubtelClient {
    pub fn new(config: GatewayConfig) -> Result<Self, BoxError> {
        Url::parse(&config.api_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn build_payload(&self, order: &Order) -> InitiatePayload {
        InitiatePayload {
            total_amount: format!("{:.2}", order.total),
            description: format!("Order - {} items", order.items.len()),
            callback_url: self.config.callback_url.clone(),
            return_url: format!(
                "{}?ref={}",
                self.config.return_url, order.client_reference
            ),
            cancellation_url: self.config.cancellation_url.clone(),
            merchant_account_number: self.config.merchant_account.clone(),
            client_reference: order.client_reference.clone(),
            payee_name: order.customer.name.clone(),
            payee_mobile_number: order
                .customer
                .phone
                .as_deref()
                .map(|p| normalize_msisdn(p, &self.config.country_prefix)),
            payee_email: order.customer.email.clone(),
            payment_method: "ALL".to_string(),
        }
    }

    async fn try_initiate(
        &self,
        payload: &InitiatePayload,
    ) -> Result<CheckoutSession, AttemptError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .json(payload)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Retryable(format!(
                "provider returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Fatal(format!(
                "provider returned {status}: {body}"
            )));
        }

        let parsed: InitiateResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(format!("invalid provider response: {e}")))?;
        session_from_response(parsed).map_err(AttemptError::Fatal)
    }
}

fn session_from_response(response: InitiateResponse) -> Result<CheckoutSession, String> {
    let data = response.data.unwrap_or(InitiateData {
        checkout_url: None,
        checkout_id: None,
    });
    match data.checkout_url {
        Some(checkout_url) => Ok(CheckoutSession {
            checkout_url,
            checkout_id: data.checkout_id,
        }),
        None => Err(response
            .message
            .unwrap_or_else(|| "provider did not return a checkout URL".to_string())),
    }
}

#[async_trait]
impl PaymentGateway for HubtelClient {
    async fn initiate_checkout(&self, order: &Order) -> Result<CheckoutSession, GatewayError> {
        let payload = self.build_payload(order);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_initiate(&payload).await {
                Ok(session) => return Ok(session),
                Err(AttemptError::Fatal(detail)) => {
                    error!(
                        client_reference = %order.client_reference,
                        detail = %detail,
                        "Checkout initiation rejected by provider"
                    );
                    return Err(GatewayError::InitiationFailed(detail));
                }
                Err(AttemptError::Retryable(detail)) => {
                    if attempt >= self.config.max_attempts.max(1) {
                        error!(
                            client_reference = %order.client_reference,
                            attempt,
                            detail = %detail,
                            "Checkout initiation failed after retries"
                        );
                        return Err(GatewayError::InitiationFailed(detail));
                    }
                    warn!(
                        client_reference = %order.client_reference,
                        attempt,
                        detail = %detail,
                        "Checkout initiation attempt failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
            }
        }
    }
}
