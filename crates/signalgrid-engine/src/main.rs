//! SignalGrid engine binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `signalgrid-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Open the configured signal store (memory or `PostgreSQL`)
//! 4. Seed an empty store, or restart every existing signal's cycle
//! 5. Spawn the ticker and the HTTP API
//! 6. On Ctrl-C, stop both and wait for them to drain

mod error;

use std::path::Path;
use std::sync::Arc;

use signalgrid_api::{AppState, ServerConfig};
use signalgrid_core::config::{LoggingConfig, SignalGridConfig, StoreBackend, StoreConfig};
use signalgrid_core::simulator::RandomVehicleSource;
use signalgrid_core::{MemoryStore, SignalService, SignalStore, ticker};
use signalgrid_db::PgSignalStore;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "signalgrid-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, store setup, seeding, or server
/// startup fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("signalgrid-engine starting");
    info!(
        from_file,
        tick_interval_secs = config.ticker.interval_secs,
        port = config.server.port,
        backend = ?config.store.backend,
        seeded_rng = config.simulation.seed.is_some(),
        "Configuration loaded"
    );

    // 3. Open the store.
    let store = open_store(&config.store).await?;

    let vehicles = config
        .simulation
        .seed
        .map_or_else(RandomVehicleSource::new, RandomVehicleSource::seeded);
    let mut service = SignalService::new(store, Box::new(vehicles));
    if let Some(seed) = config.simulation.seed {
        service = service.with_placement_seed(seed);
    }
    let service = Arc::new(service);

    // 4. Seed or re-initialize.
    let seeded = service
        .seed_if_empty(&config.seed_signals)
        .await
        .map_err(EngineError::from)?;
    if seeded > 0 {
        info!(signals = seeded, "Seeded empty store");
    } else {
        let initialized = service.initialize_all().await.map_err(EngineError::from)?;
        info!(signals = initialized, "Restarted signal cycles");
    }

    // 5. Spawn ticker and API.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ticker_handle = tokio::spawn(ticker::run_ticker(
        Arc::clone(&service),
        config.ticker.interval_secs,
        shutdown_rx.clone(),
    ));

    let app_state = Arc::new(
        AppState::new(Arc::clone(&service)).with_history_limit(config.simulation.history_limit),
    );
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let api_handle = signalgrid_api::spawn_api(&server_config, app_state, shutdown_rx)
        .await
        .map_err(EngineError::from)?;

    // 6. Wait for Ctrl-C, then drain.
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EngineError::Shutdown {
            message: format!("failed to listen for Ctrl-C: {e}"),
        })?;
    info!("Shutdown requested");

    if shutdown_tx.send(true).is_err() {
        warn!("Ticker and API already stopped");
    }
    match ticker_handle.await {
        Ok(passes) => info!(passes, "Ticker joined"),
        Err(e) => warn!(error = %e, "Ticker task panicked"),
    }
    if let Err(e) = api_handle.await {
        warn!(error = %e, "API task panicked");
    }

    info!("signalgrid-engine stopped");
    Ok(())
}

/// Load configuration from [`CONFIG_PATH`], falling back to defaults.
///
/// Environment overrides apply in both cases. Returns whether the file
/// was found.
fn load_config() -> Result<(SignalGridConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((SignalGridConfig::from_file(config_path)?, true))
    } else {
        let mut config = SignalGridConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, false))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Build the configured [`SignalStore`].
async fn open_store(config: &StoreConfig) -> Result<Arc<dyn SignalStore>, EngineError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory signal store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PgSignalStore::open(config).await?;
            info!("Using PostgreSQL signal store");
            Ok(Arc::new(store))
        }
    }
}
