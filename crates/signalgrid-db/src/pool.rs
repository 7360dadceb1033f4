//! Pool setup for [`PgSignalStore`](crate::PgSignalStore).
//!
//! Sizing and the acquire timeout come straight from the `store` section
//! of the SignalGrid config. Queries are built at runtime, so the crate
//! compiles without a live database.

use std::time::Duration;

use signalgrid_core::config::StoreConfig;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::DbError;

/// Open a pool against `store.postgres_url`.
///
/// # Errors
///
/// Returns [`DbError::Config`] for an unparseable URL or an empty pool,
/// and [`DbError::Postgres`] if no connection can be made.
pub async fn connect(config: &StoreConfig) -> Result<PgPool, DbError> {
    if config.max_connections == 0 {
        return Err(DbError::Config(
            "store.max_connections must be at least 1".to_owned(),
        ));
    }
    let options: PgConnectOptions = config
        .postgres_url
        .parse()
        .map_err(|e: sqlx::Error| DbError::Config(format!("invalid store.postgres_url: {e}")))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout_secs,
        "Signal database connected"
    );
    Ok(pool)
}

/// Bring the `signals` and `signal_history` tables up to date.
///
/// # Errors
///
/// Returns [`DbError::Migration`] if any migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Signal schema migrated");
    Ok(())
}
