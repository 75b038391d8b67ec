use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use common::Config;
use storefront::api::{AppState, initialize_tracing, run_backend};
use storefront::callback::CallbackProcessor;
use storefront::gateway::{HubtelClient, PaymentGateway};
use storefront::notify::{HttpNotifier, Notifier};
use storefront::orders::OrderService;
use storefront::pg_storage::PgStorage;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    println!("Loading config from: {}", args.config);
    let config = Config::load(&args.config)?;
    initialize_tracing(&config.backend.log_level);

    let storage = Arc::new(PgStorage::new(&config.common.database_url).await?);
    let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(&config.notifier)?);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(HubtelClient::new(config.gateway.clone())?);

    let orders = Arc::new(OrderService::new(
        storage.clone(),
        storage.clone(),
        notifier.clone(),
        config.backend.frontend_url.clone(),
    ));
    let callbacks = Arc::new(CallbackProcessor::new(
        storage.clone(),
        storage.clone(),
        storage,
        notifier,
    ));

    let state = AppState {
        orders,
        callbacks,
        gateway,
        admin_key: config.backend.admin_key.clone(),
    };
    run_backend(&config.backend, state).await
}
