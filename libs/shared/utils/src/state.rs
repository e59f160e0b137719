use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StoreBackend};
use shared_database::{InMemoryStore, SchedulingStore, SupabaseSchedulingStore};

use crate::clock::{Clock, SystemClock};

/// Router state shared by every cell.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { config, store, clock }
    }

    /// Wire the configured store with the system clock.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let store: Arc<dyn SchedulingStore> = match config.store_backend {
            StoreBackend::Supabase => {
                info!("Using Supabase scheduling store at {}", config.supabase_url);
                Arc::new(SupabaseSchedulingStore::new(&config))
            }
            StoreBackend::Memory => {
                info!("Using in-memory scheduling store");
                Arc::new(InMemoryStore::new())
            }
        };

        Self::new(config, store, Arc::new(SystemClock))
    }
}
