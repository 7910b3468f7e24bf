//! Store backend selection

use crate::config::BotConfig;
use crate::ledger::{InMemoryLedger, LedgerStore, PostgresLedgerStore, TagStore};
use crate::state::{InMemoryStateStore, PostgresStateStore, StateStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Handles to the three stores the dispatcher needs
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub tags: Arc<dyn TagStore>,
    pub states: Arc<dyn StateStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        Self {
            ledger: ledger.clone(),
            tags: ledger,
            states: Arc::new(InMemoryStateStore::new()),
        }
    }
}

/// Postgres when a database URL is configured, otherwise in-memory
pub fn build_stores(config: &BotConfig) -> Stores {
    if let Some(url) = config.database_url.as_deref() {
        match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(config.store_timeout)
            .connect_lazy(url)
        {
            Ok(pool) => {
                info!("Ledger backend: postgres");
                let ledger = Arc::new(PostgresLedgerStore::new(pool.clone()));
                return Stores {
                    ledger: ledger.clone(),
                    tags: ledger,
                    states: Arc::new(PostgresStateStore::new(pool)),
                };
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres backend, falling back to in-memory: {}",
                    error
                );
            }
        }
    }

    info!("Ledger backend: in-memory");
    Stores::in_memory()
}
