//! HTTP server lifecycle.
//!
//! [`bind`] claims the TCP port and [`serve`] runs the router until the
//! shutdown channel flips.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind a TCP listener for `config`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or in use.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve the API on `listener` until `shutdown` becomes `true` or its
/// sender is dropped. In-flight requests are allowed to finish.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "API server listening");
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            let _stopped = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("API server stopped");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use signalgrid_core::simulator::ScriptedVehicleSource;
    use signalgrid_core::{MemoryStore, SignalService, SignalStore};

    use super::*;

    #[tokio::test]
    async fn serve_stops_when_shutdown_flips() {
        let store: Arc<dyn SignalStore> = Arc::new(MemoryStore::new());
        let service = Arc::new(SignalService::new(
            store,
            Box::new(ScriptedVehicleSource::default()),
        ));
        let state = Arc::new(AppState::new(service));

        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        };
        let listener = bind(&config).await.unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);
        let server = tokio::spawn(serve(listener, state, stop_rx));

        stop_tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bad_host_is_a_bind_error() {
        let config = ServerConfig {
            host: "not a host".to_owned(),
            port: 5000,
        };
        assert!(matches!(bind(&config).await, Err(ServerError::Bind(_))));
    }
}
