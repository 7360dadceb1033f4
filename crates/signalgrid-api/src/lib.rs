//! HTTP API for SignalGrid.
//!
//! An Axum server exposing:
//!
//! - **Read endpoints** for signals, per-signal history, and analytics.
//!   Signal responses carry a live `efficiency` score and a
//!   `density_color` hint.
//! - **Operator endpoints** for creating and deleting signals, overrides,
//!   emergency mode, bulk re-simulation, and relocation.
//! - **Minimal HTML status page** (`GET /`) listing every signal.
//!
//! Every handler goes through the shared
//! [`SignalService`](signalgrid_core::SignalService), so API writes and
//! ticker writes to the same signal are serialized.

pub mod error;
pub mod handlers;
pub mod operator;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::spawn_api;
pub use state::AppState;
