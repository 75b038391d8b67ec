use crate::storage::BoxError;
use async_trait::async_trait;
use common::config::NotifierConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Outbound confirmation messages. Fire-and-forget from the order flow's
/// perspective: callers log failures and never propagate them to the
/// customer-facing response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), BoxError>;
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Mail delivery through an HTTP mail API (bearer-key authenticated JSON
/// endpoint). The provider is a black box; any non-success response is an
/// error for the caller to log.
pub struct HttpNotifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, BoxError> {
        Url::parse(&config.api_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), BoxError> {
        let request = MailRequest {
            from: &self.sender,
            to,
            subject,
            html: html_body,
        };
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        response.error_for_status()?;
        debug!(to, subject, "Notification dispatched");
        Ok(())
    }
}
