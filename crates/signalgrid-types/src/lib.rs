//! Shared type definitions for the SignalGrid simulator.
//!
//! This crate is the single source of truth for all types used across the
//! SignalGrid workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the operator dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer wrappers for entity identifiers
//! - [`enums`] -- Density classes and signal phases
//! - [`structs`] -- Signals, history snapshots, and analytics rollups
//! - [`patch`] -- Typed per-operation field updates applied to a signal

pub mod enums;
pub mod ids;
pub mod patch;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Density, ParseEnumError, Phase};
pub use ids::{HistoryId, SignalId};
pub use patch::{NewSnapshot, SignalPatch};
pub use structs::{
    Analytics, HistorySnapshot, NewSignal, PeakReading, Signal, SignalRanking,
};

#[cfg(test)]
mod tests {
    //! Integration tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::SignalId::export_all();
        let _ = crate::ids::HistoryId::export_all();

        let _ = crate::enums::Density::export_all();
        let _ = crate::enums::Phase::export_all();

        let _ = crate::structs::Signal::export_all();
        let _ = crate::structs::NewSignal::export_all();
        let _ = crate::structs::HistorySnapshot::export_all();
        let _ = crate::structs::Analytics::export_all();
        let _ = crate::structs::PeakReading::export_all();
        let _ = crate::structs::SignalRanking::export_all();
    }
}
