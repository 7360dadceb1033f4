//! Signal timing policy, phase state machine, and ticker for SignalGrid.
//!
//! This crate owns everything with temporal or state-machine logic: the
//! pure policy that maps vehicle counts to timings, the transitions that
//! keep a signal's fields consistent, and the periodic ticker that
//! advances every signal's countdown.
//!
//! # Modules
//!
//! - [`timing`] -- Pure timing policy (green time, density, phase, efficiency).
//! - [`simulator`] -- [`VehicleSource`] trait and the random demand source.
//! - [`machine`] -- Signal state machine producing typed patches.
//! - [`store`] -- [`SignalStore`] trait and the in-memory store.
//! - [`service`] -- Per-signal locked read-modify-write over a store.
//! - [`ticker`] -- The periodic tick loop.
//! - [`config`] -- Configuration loading from `signalgrid-config.yaml`.
//!
//! [`VehicleSource`]: simulator::VehicleSource
//! [`SignalStore`]: store::SignalStore

pub mod config;
pub mod machine;
pub mod service;
pub mod simulator;
pub mod store;
pub mod ticker;
pub mod timing;

pub use service::{OverrideRequest, SignalError, SignalService, TickOutcome};
pub use store::{MemoryStore, SignalStore, StoreError};
