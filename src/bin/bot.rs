use cashbook_agent::{
    config::BotConfig,
    stores::build_stores,
    transport::{telegram, TelegramClient},
    Dispatcher,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let token = config.require_telegram_token()?;
    let client = TelegramClient::new(token, config.poll_timeout)?;

    let stores = build_stores(&config);
    let dispatcher =
        Arc::new(Dispatcher::from_stores(stores).with_store_timeout(config.store_timeout));

    info!("Cashbook bot polling for updates");

    if let Err(e) = telegram::run(dispatcher, client).await {
        eprintln!("Bot stopped: {}", e);
        return Err(Box::new(e) as Box<dyn std::error::Error>);
    }

    Ok(())
}
