//! Core entity structs for the SignalGrid simulator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Density, Phase};
use crate::ids::{HistoryId, SignalId};

// ---------------------------------------------------------------------------
// Signal (mutable)
// ---------------------------------------------------------------------------

/// One traffic signal, i.e. one physical intersection.
///
/// The timing fields (`green_time`, `density`, `countdown`,
/// `current_phase`) are only ever written through a
/// [`SignalPatch`](crate::patch::SignalPatch) so they move together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Signal {
    /// Store-assigned identifier, immutable after creation.
    pub id: SignalId,
    /// Short display name (e.g. `Signal-A`).
    pub name: String,
    /// Human-readable intersection name.
    pub location: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Last simulated or overridden demand.
    pub vehicle_count: u32,
    /// Green duration in seconds (always positive).
    pub green_time: u32,
    /// Demand class derived from `vehicle_count`.
    pub density: Density,
    /// Light currently shown.
    pub current_phase: Phase,
    /// Seconds remaining in the current cycle.
    pub countdown: u32,
    /// Pinned to green and excluded from ticking while set.
    pub emergency: bool,
}

/// Input for creating a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewSignal {
    /// Short display name.
    pub name: String,
    /// Human-readable intersection name.
    pub location: String,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
    /// Seed demand used for the first cycle.
    #[serde(default)]
    pub vehicle_count: u32,
}

// ---------------------------------------------------------------------------
// History (append-only)
// ---------------------------------------------------------------------------

/// Immutable record of a signal's demand and timing at a point in time.
///
/// Appended once per cycle boundary or explicit override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistorySnapshot {
    /// Row identifier (monotonic per store).
    pub id: HistoryId,
    /// The signal this snapshot belongs to.
    pub signal_id: SignalId,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Vehicle count at snapshot time.
    pub vehicle_count: u32,
    /// Green duration at snapshot time.
    pub green_time: u32,
    /// Density class at snapshot time.
    pub density: Density,
}

// ---------------------------------------------------------------------------
// Analytics rollups
// ---------------------------------------------------------------------------

/// The single highest vehicle count ever recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PeakReading {
    /// Signal that recorded the peak.
    pub signal_id: SignalId,
    /// The peak count.
    pub vehicle_count: u32,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Per-signal aggregate over the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SignalRanking {
    /// Signal identifier.
    pub id: SignalId,
    /// Signal display name.
    pub name: String,
    /// Number of snapshots recorded for this signal.
    pub total_snapshots: u64,
    /// Mean vehicle count (0 when there is no history).
    pub avg_vehicles: f64,
    /// Highest vehicle count (0 when there is no history).
    pub peak_vehicles: u32,
    /// Lowest vehicle count (0 when there is no history).
    pub min_vehicles: u32,
}

/// System-wide reporting view over the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Analytics {
    /// Total history rows across all signals.
    pub total_snapshots: u64,
    /// Highest single reading, if any history exists.
    pub peak: Option<PeakReading>,
    /// Mean vehicle count across all history, rounded to one decimal.
    pub average_vehicles: f64,
    /// Per-signal rollups, busiest (highest average) first.
    pub signal_rankings: Vec<SignalRanking>,
    /// Snapshot count per density class.
    pub density_distribution: BTreeMap<Density, u64>,
}
