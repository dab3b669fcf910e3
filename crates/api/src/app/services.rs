use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use tally_infra::{
    AppConfig, InMemoryLedgerStore, LedgerEngine, LedgerQueries, LedgerStore, PostgresLedgerStore, StoreError,
};

/// Store handle shared by the engine and the query layer.
pub type SharedStore = Arc<dyn LedgerStore>;

/// Everything the HTTP handlers need, built once at startup.
pub struct AppServices {
    pub engine: LedgerEngine<SharedStore>,
    pub queries: LedgerQueries<SharedStore>,
    pub expose_internal_errors: bool,
    /// Origin allowed by CORS.
    pub frontend_url: String,
    started_at: Instant,
}

impl AppServices {
    pub fn new(store: SharedStore, config: &AppConfig) -> Self {
        Self {
            engine: LedgerEngine::with_retry(store.clone(), config.retry),
            queries: LedgerQueries::new(store),
            expose_internal_errors: config.expose_internal_errors,
            frontend_url: config.frontend_url.clone(),
            started_at: Instant::now(),
        }
    }

    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), config)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Pick the storage backend from config: Postgres when `DATABASE_URL` is set
/// (schema applied before serving), in-memory otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let store: SharedStore = match &config.database_url {
        Some(url) => {
            let store = PostgresLedgerStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            info!(max_connections = config.database_max_connections, "using postgres ledger store");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory ledger store (data is lost on restart)");
            Arc::new(InMemoryLedgerStore::new())
        }
    };
    Ok(AppServices::new(store, config))
}
