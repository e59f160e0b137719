use std::env;
use tracing::warn;

/// Which backing store the API binary should wire the engines to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub bind_addr: String,
    pub store_backend: StoreBackend,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_service_key = env::var("SUPABASE_SERVICE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                String::new()
            });
        let bind_addr = env::var("API_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let store_backend = match env::var("SCHEDULING_STORE").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            Ok("supabase") => StoreBackend::Supabase,
            Ok(other) => {
                warn!("Unknown SCHEDULING_STORE '{}', falling back to supabase", other);
                StoreBackend::Supabase
            }
            Err(_) if supabase_url.is_empty() => {
                warn!("No store configured, using in-memory store");
                StoreBackend::Memory
            }
            Err(_) => StoreBackend::Supabase,
        };

        let config = Self {
            supabase_url,
            supabase_service_key,
            bind_addr,
            store_backend,
        };

        if config.store_backend == StoreBackend::Supabase && !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Config pointing at a given store URL; used by tests and tooling.
    pub fn for_store(supabase_url: impl Into<String>, supabase_service_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            supabase_service_key: supabase_service_key.into(),
            bind_addr: "127.0.0.1:0".to_string(),
            store_backend: StoreBackend::Supabase,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_key.is_empty()
    }
}
