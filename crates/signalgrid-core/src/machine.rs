//! Signal state machine.
//!
//! Each operation takes the current [`Signal`] and an input event and
//! returns a [`Transition`]: the typed [`SignalPatch`] to persist plus
//! whether a history snapshot is due. Nothing here touches a store, so
//! every rule can be checked without I/O.
//!
//! Phase is only ever assigned from [`timing::determine_phase`] or as
//! green at cycle start, which keeps the phase/countdown invariant for
//! every non-emergency signal.

use chrono::{DateTime, Utc};
use signalgrid_types::{NewSnapshot, Phase, Signal, SignalPatch};

use crate::simulator::VehicleSource;
use crate::timing;

/// Countdown shown while a signal is in emergency mode.
///
/// Larger than any default cycle. The ticker skips emergency signals by
/// their flag, so this value is never decremented.
pub const EMERGENCY_COUNTDOWN: u32 = 999;

/// Largest vehicle count an operator may set.
pub const MAX_VEHICLE_COUNT: u32 = 10_000;

/// Longest green duration (seconds) an operator may set.
pub const MAX_GREEN_TIME_SECS: u32 = 3_600;

/// Errors raised by override validation before any state changes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    /// Neither a vehicle count nor a green time was supplied.
    #[error("override requires vehicle_count or green_time")]
    NothingToOverride,

    /// The explicit green time was zero.
    #[error("green_time must be positive")]
    ZeroGreenTime,

    /// The vehicle count exceeded [`MAX_VEHICLE_COUNT`].
    #[error("vehicle_count {0} exceeds {max}", max = MAX_VEHICLE_COUNT)]
    VehicleCountTooHigh(u32),

    /// The green time exceeded [`MAX_GREEN_TIME_SECS`].
    #[error("green_time {0} exceeds {max}", max = MAX_GREEN_TIME_SECS)]
    GreenTimeTooLong(u32),
}

/// Reject a vehicle count above [`MAX_VEHICLE_COUNT`].
///
/// # Errors
///
/// Returns [`OverrideError::VehicleCountTooHigh`].
pub const fn check_vehicle_count(vehicle_count: u32) -> Result<u32, OverrideError> {
    if vehicle_count > MAX_VEHICLE_COUNT {
        return Err(OverrideError::VehicleCountTooHigh(vehicle_count));
    }
    Ok(vehicle_count)
}

const fn check_green_time(green_time: u32) -> Result<u32, OverrideError> {
    if green_time == 0 {
        return Err(OverrideError::ZeroGreenTime);
    }
    if green_time > MAX_GREEN_TIME_SECS {
        return Err(OverrideError::GreenTimeTooLong(green_time));
    }
    Ok(green_time)
}

/// The outcome of applying one event to a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Fields to persist.
    pub patch: SignalPatch,
    /// Whether a history snapshot must be appended with the patch.
    pub snapshot: bool,
}

impl Transition {
    /// The signal as it will look once the patch is persisted.
    #[must_use]
    pub fn next_state(&self, signal: &Signal) -> Signal {
        self.patch.applied(signal)
    }

    /// The history row to append, if one is due.
    ///
    /// Captures post-patch values, so an explicit green time shows up in
    /// the snapshot even though density still reflects the vehicle count.
    pub fn snapshot_for(&self, signal: &Signal, at: DateTime<Utc>) -> Option<NewSnapshot> {
        self.snapshot
            .then(|| NewSnapshot::of(&self.next_state(signal), at))
    }
}

/// Start a fresh cycle for the given demand.
///
/// Used at signal creation, at startup, and at every cycle rollover.
pub const fn initialize_cycle(vehicle_count: u32) -> Transition {
    let green_time = timing::calculate_green_time(vehicle_count);
    Transition {
        patch: SignalPatch::Cycle {
            vehicle_count,
            green_time,
            density: timing::classify_density(vehicle_count),
            countdown: timing::get_cycle_length(green_time),
            current_phase: Phase::Green,
        },
        snapshot: true,
    }
}

/// Advance a signal by `elapsed_secs`.
///
/// Returns `None` for emergency signals. When the countdown runs out a
/// new vehicle count is drawn from `source` and a fresh cycle begins.
pub fn tick(
    signal: &Signal,
    elapsed_secs: u32,
    source: &mut dyn VehicleSource,
) -> Option<Transition> {
    if signal.emergency {
        return None;
    }

    let remaining = signal.countdown.saturating_sub(elapsed_secs);
    if remaining == 0 {
        return Some(initialize_cycle(source.next_count()));
    }

    Some(Transition {
        patch: SignalPatch::Countdown {
            countdown: remaining,
            current_phase: timing::determine_phase(remaining, signal.green_time),
        },
        snapshot: false,
    })
}

/// Replace the demand and restart the cycle from it.
pub const fn override_vehicle_count(vehicle_count: u32) -> Transition {
    initialize_cycle(vehicle_count)
}

/// Force a green duration, leaving demand and density untouched.
///
/// # Errors
///
/// Returns [`OverrideError`] for a zero duration or one above
/// [`MAX_GREEN_TIME_SECS`].
pub const fn override_green_time(green_time: u32) -> Result<Transition, OverrideError> {
    if let Err(err) = check_green_time(green_time) {
        return Err(err);
    }
    Ok(Transition {
        patch: SignalPatch::GreenTime {
            green_time,
            countdown: timing::get_cycle_length(green_time),
            current_phase: Phase::Green,
        },
        snapshot: true,
    })
}

/// Apply an operator override with either or both fields.
///
/// The vehicle count is applied first; an explicit green time then
/// replaces the derived one while density stays on the vehicle-count
/// tier. Exactly one snapshot is emitted for the final state.
///
/// # Errors
///
/// Returns [`OverrideError`] when nothing is supplied or a value is out
/// of range. No state is changed in any of these cases.
pub const fn apply_override(
    vehicle_count: Option<u32>,
    green_time: Option<u32>,
) -> Result<Transition, OverrideError> {
    match (vehicle_count, green_time) {
        (None, None) => Err(OverrideError::NothingToOverride),
        (Some(count), None) => match check_vehicle_count(count) {
            Ok(count) => Ok(override_vehicle_count(count)),
            Err(err) => Err(err),
        },
        (None, Some(green)) => override_green_time(green),
        (Some(count), Some(green)) => {
            if let Err(err) = check_vehicle_count(count) {
                return Err(err);
            }
            if let Err(err) = check_green_time(green) {
                return Err(err);
            }
            Ok(Transition {
                patch: SignalPatch::Cycle {
                    vehicle_count: count,
                    green_time: green,
                    density: timing::classify_density(count),
                    countdown: timing::get_cycle_length(green),
                    current_phase: Phase::Green,
                },
                snapshot: true,
            })
        }
    }
}

/// Enter or leave emergency mode.
///
/// Enabling pins the signal green with [`EMERGENCY_COUNTDOWN`]. Disabling
/// restarts a normal cycle from the signal's existing vehicle count.
/// Density and vehicle count are never changed, and no snapshot is taken.
pub const fn set_emergency(signal: &Signal, enabled: bool) -> Transition {
    let patch = if enabled {
        SignalPatch::EmergencyOn {
            countdown: EMERGENCY_COUNTDOWN,
            current_phase: Phase::Green,
        }
    } else {
        let green_time = timing::calculate_green_time(signal.vehicle_count);
        SignalPatch::EmergencyOff {
            green_time,
            countdown: timing::get_cycle_length(green_time),
            current_phase: Phase::Green,
        }
    };
    Transition {
        patch,
        snapshot: false,
    }
}
