use serde::Deserialize;
use std::{error::Error, fs};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackendConfig {
    pub server_address: String,
    pub log_level: String,
    /// Shared secret compared against the `x-admin-key` header. An empty
    /// value locks out every admin route.
    #[serde(default)]
    pub admin_key: String,
    pub cors_origin: String,
    /// Base URL of the storefront UI, used for tracking links in emails.
    pub frontend_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub merchant_account: String,
    pub callback_url: String,
    pub return_url: String,
    pub cancellation_url: String,
    /// International prefix substituted for a leading local-trunk zero.
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts for a checkout initiation, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifierConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
}

fn default_country_prefix() -> String {
    "233".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    pub backend: BackendConfig,
    pub gateway: GatewayConfig,
    pub notifier: NotifierConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let contents = fs::read_to_string(config_path)?;
        let config = serde_yml::from_str(&contents)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_gateway_fields() {
        let yaml = r#"
common:
  project_name: storefront
  database_url: postgres://localhost/storefront
backend:
  server_address: 127.0.0.1:8080
  log_level: info
  cors_origin: http://localhost:5173
  frontend_url: http://localhost:5173
gateway:
  api_url: https://payproxyapi.hubtel.com/items/initiate
  client_id: id
  client_secret: secret
  merchant_account: "12345"
  callback_url: https://api.example.com/payment/callback
  return_url: https://shop.example.com/track-order
  cancellation_url: https://shop.example.com/checkout
notifier:
  api_url: https://mail.example.com/send
  api_key: key
  sender: orders@example.com
"#;
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.gateway.country_prefix, "233");
        assert_eq!(config.gateway.timeout_secs, 10);
        assert_eq!(config.gateway.max_attempts, 3);
        assert_eq!(config.backend.admin_key, "");
    }
}
