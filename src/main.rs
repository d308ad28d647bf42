//! ==============================================================================
//! main.rs - moisture host entry point
//! ==============================================================================
//!
//! purpose:
//!     boots the readings service: sensor nodes post moisture/light readings,
//!     dashboards query them back (optionally downsampled) and ask whether
//!     the plant was just watered.
//!
//! responsibilities:
//!     - load host.toml (or defaults) and apply the PORT override
//!     - initialize tracing
//!     - pick the storage backend (memory or remote datastore)
//!     - serve the http api
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                   rust host (this file)                  │
//!     │                                                          │
//!     │   sensor node ──POST──▶ ┌────────────┐                   │
//!     │                         │ server.rs  │──▶ normalize       │
//!     │   dashboard ───GET────▶ │  (axum)    │──▶ downsample      │
//!     │                         └─────┬──────┘──▶ detection       │
//!     │                               │                          │
//!     │                        ┌──────┴──────┐                   │
//!     │                        │ SensorStore │ <- storage.rs     │
//!     │                        └──────┬──────┘                   │
//!     └───────────────────────────────┼──────────────────────────┘
//!                         ┌───────────┴───────────┐
//!                         ▼                       ▼
//!                  ┌─────────────┐         ┌─────────────┐
//!                  │ MemoryStore │         │  datastore  │
//!                  │ (in-proc)   │         │  (remote)   │
//!                  └─────────────┘         └─────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use moisture_host::config::{HostConfig, StorageBackend};
use moisture_host::datastore::DatastoreStore;
use moisture_host::detection::WateringDetector;
use moisture_host::server::{self, AppState};
use moisture_host::storage::{MemoryStore, SensorStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (mut config, source, warnings) = HostConfig::load_or_default();
    config.apply_env();

    // step 2: logging, RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    match &source {
        Some(path) => tracing::info!(path = %path.display(), "loaded configuration"),
        None => tracing::warn!("no config file found - using defaults"),
    }
    config.log_summary();

    // step 3: pick the storage backend and serve
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    match config.storage.backend {
        StorageBackend::Memory => {
            let store = MemoryStore::new(config.expiry_horizon());
            server::serve(app_state(store, &config), &addr).await
        }
        StorageBackend::Datastore => {
            let store = DatastoreStore::new(&config.storage.datastore, config.expiry_horizon());
            server::serve(app_state(store, &config), &addr).await
        }
    }
}

fn app_state<S: SensorStore>(store: S, config: &HostConfig) -> AppState<S> {
    AppState {
        store,
        detector: WateringDetector::new(config.detection.strategy),
        detection_window: config.detection_window(),
        greeting_name: config.server.name.clone(),
    }
}
