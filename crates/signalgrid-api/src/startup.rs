//! Server startup helper for embedding in the engine binary.
//!
//! [`spawn_api`] binds the port on the caller's task and then serves on
//! a background task.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Bind the API listener and serve it on a background Tokio task.
///
/// The task ends when `shutdown` flips to `true`. Await the returned
/// handle to wait for in-flight requests to drain.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address cannot be bound.
pub async fn spawn_api(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, ServerError> {
    let listener = server::bind(config).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "API server exited with error");
        }
    });

    tracing::info!(host = %config.host, port = config.port, "API server spawned on background task");

    Ok(handle)
}
