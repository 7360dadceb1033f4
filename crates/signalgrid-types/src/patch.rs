//! Typed field updates for a [`Signal`].
//!
//! Every mutation of a signal is expressed as one [`SignalPatch`] variant.
//! Each variant names exactly the fields its operation is allowed to
//! change, so a store can never be asked to persist, say, a new
//! `green_time` without the matching `countdown`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Density, Phase};
use crate::structs::Signal;

/// A per-operation set of signal field updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalPatch {
    /// Start of a fresh cycle (creation, rollover, vehicle-count override).
    Cycle {
        /// New demand.
        vehicle_count: u32,
        /// Green duration derived from the demand (or explicitly overridden).
        green_time: u32,
        /// Density class derived from the demand.
        density: Density,
        /// Full cycle length.
        countdown: u32,
        /// Always green at cycle start.
        current_phase: Phase,
    },

    /// Mid-cycle countdown advance.
    Countdown {
        /// Seconds remaining.
        countdown: u32,
        /// Phase for the remaining seconds.
        current_phase: Phase,
    },

    /// Explicit green-time override; demand and density are untouched.
    GreenTime {
        /// Operator-chosen green duration.
        green_time: u32,
        /// Cycle length for that green duration.
        countdown: u32,
        /// Always green after an override.
        current_phase: Phase,
    },

    /// Enter emergency mode.
    EmergencyOn {
        /// Display sentinel; emergency signals are never ticked.
        countdown: u32,
        /// Pinned green.
        current_phase: Phase,
    },

    /// Leave emergency mode and restart a normal cycle.
    EmergencyOff {
        /// Green duration recomputed from the existing demand.
        green_time: u32,
        /// Full cycle length.
        countdown: u32,
        /// Always green at cycle start.
        current_phase: Phase,
    },

    /// Geographic move; no timing fields change.
    Placement {
        /// New latitude.
        lat: f64,
        /// New longitude.
        lng: f64,
    },
}

impl SignalPatch {
    /// Apply this patch to a signal in place.
    pub const fn apply_to(&self, signal: &mut Signal) {
        match *self {
            Self::Cycle {
                vehicle_count,
                green_time,
                density,
                countdown,
                current_phase,
            } => {
                signal.vehicle_count = vehicle_count;
                signal.green_time = green_time;
                signal.density = density;
                signal.countdown = countdown;
                signal.current_phase = current_phase;
            }
            Self::Countdown {
                countdown,
                current_phase,
            } => {
                signal.countdown = countdown;
                signal.current_phase = current_phase;
            }
            Self::GreenTime {
                green_time,
                countdown,
                current_phase,
            } => {
                signal.green_time = green_time;
                signal.countdown = countdown;
                signal.current_phase = current_phase;
            }
            Self::EmergencyOn {
                countdown,
                current_phase,
            } => {
                signal.emergency = true;
                signal.countdown = countdown;
                signal.current_phase = current_phase;
            }
            Self::EmergencyOff {
                green_time,
                countdown,
                current_phase,
            } => {
                signal.emergency = false;
                signal.green_time = green_time;
                signal.countdown = countdown;
                signal.current_phase = current_phase;
            }
            Self::Placement { lat, lng } => {
                signal.lat = lat;
                signal.lng = lng;
            }
        }
    }

    /// Return a copy of `signal` with this patch applied.
    #[must_use]
    pub fn applied(&self, signal: &Signal) -> Signal {
        let mut next = signal.clone();
        self.apply_to(&mut next);
        next
    }
}

/// A history row waiting to be appended alongside a patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSnapshot {
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Vehicle count after the patch.
    pub vehicle_count: u32,
    /// Green duration after the patch.
    pub green_time: u32,
    /// Density class after the patch.
    pub density: Density,
}

impl NewSnapshot {
    /// Capture the history-relevant fields of a (post-patch) signal.
    pub const fn of(signal: &Signal, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            vehicle_count: signal.vehicle_count,
            green_time: signal.green_time,
            density: signal.density,
        }
    }
}
