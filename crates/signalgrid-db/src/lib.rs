//! `PostgreSQL` persistence for SignalGrid.
//!
//! Implements [`SignalStore`](signalgrid_core::SignalStore) on top of a
//! [`sqlx`] connection pool so signal state and history survive restarts.
//!
//! # Modules
//!
//! - [`pool`] -- Pool setup from the `store` config and migrations
//! - [`signal_store`] -- [`PgSignalStore`], the durable `SignalStore`
//! - [`error`] -- Shared error types

pub mod error;
pub mod pool;
pub mod signal_store;

pub use error::DbError;
pub use signal_store::{HistoryRow, PgSignalStore, SignalRow};
