//! Shared application state for the API server.

use std::sync::Arc;

use signalgrid_core::SignalService;

/// Snapshots returned by `GET /api/history/{id}` when no `limit` is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. The
/// service is the same instance the ticker drives.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Signal operations.
    pub service: Arc<SignalService>,
    /// Default history page size.
    pub history_limit: usize,
}

impl AppState {
    /// Create state around a service with the default history limit.
    pub const fn new(service: Arc<SignalService>) -> Self {
        Self {
            service,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Override the default history page size.
    #[must_use]
    pub const fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}
