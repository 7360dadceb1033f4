//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error so `main` can propagate
/// with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: signalgrid_core::config::ConfigError,
    },

    /// Connecting to or migrating `PostgreSQL` failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: signalgrid_db::DbError,
    },

    /// Seeding or initializing signals failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying signal error.
        #[from]
        source: signalgrid_core::SignalError,
    },

    /// The API server failed to start.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: signalgrid_api::ServerError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("shutdown error: {message}")]
    Shutdown {
        /// Description of the failure.
        message: String,
    },
}
