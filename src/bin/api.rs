use cashbook_agent::{api::start_server, config::BotConfig, stores::build_stores, Dispatcher};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (.env included)
    let config = BotConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Cashbook Agent - API Server");
    info!("Port: {}", config.api_port);

    let stores = build_stores(&config);
    let dispatcher =
        Arc::new(Dispatcher::from_stores(stores).with_store_timeout(config.store_timeout));

    info!("Dispatcher initialized");

    start_server(dispatcher, config.api_port).await?;

    Ok(())
}
