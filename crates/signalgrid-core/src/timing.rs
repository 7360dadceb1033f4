//! Timing policy: pure functions from demand to signal timing.
//!
//! Nothing here holds state or performs I/O. Green time and density are
//! both derived from [`classify_density`], so the two can never
//! disagree for the same vehicle count.
//!
//! # Cycle layout
//!
//! ```text
//! |<------------- green_time ------------->|<- 5s yellow ->|<- 5s all-red ->|
//! countdown:  cycle_length ...  9 | 8 ... 4 | 3 ... 0
//! phase:           green          | yellow  |   red
//! ```
//!
//! The yellow and red thresholds are fixed and do not scale with the
//! green time.

use signalgrid_types::{Density, Phase};

/// Vehicle counts strictly above this are [`Density::High`].
pub const HIGH_DENSITY_ABOVE: u32 = 40;

/// Vehicle counts at or above this (and not high) are [`Density::Medium`].
pub const MEDIUM_DENSITY_FROM: u32 = 20;

/// Green seconds for [`Density::High`].
pub const HIGH_GREEN_SECS: u32 = 70;

/// Green seconds for [`Density::Medium`].
pub const MEDIUM_GREEN_SECS: u32 = 45;

/// Green seconds for [`Density::Low`].
pub const LOW_GREEN_SECS: u32 = 25;

/// Yellow interval appended to every green.
pub const YELLOW_SECS: u32 = 5;

/// All-red buffer appended after yellow.
pub const ALL_RED_SECS: u32 = 5;

/// Countdowns above this show green.
pub const YELLOW_FROM_COUNTDOWN: u32 = 8;

/// Countdowns at or below this show red.
pub const RED_FROM_COUNTDOWN: u32 = 3;

/// Classify demand into a density class.
pub const fn classify_density(vehicle_count: u32) -> Density {
    if vehicle_count > HIGH_DENSITY_ABOVE {
        Density::High
    } else if vehicle_count >= MEDIUM_DENSITY_FROM {
        Density::Medium
    } else {
        Density::Low
    }
}

/// Green seconds for a density class.
pub const fn green_time_for(density: Density) -> u32 {
    match density {
        Density::High => HIGH_GREEN_SECS,
        Density::Medium => MEDIUM_GREEN_SECS,
        Density::Low => LOW_GREEN_SECS,
    }
}

/// Green seconds for a vehicle count. Monotonic non-decreasing.
pub const fn calculate_green_time(vehicle_count: u32) -> u32 {
    green_time_for(classify_density(vehicle_count))
}

/// Full cycle length: green plus yellow plus all-red.
pub const fn get_cycle_length(green_time: u32) -> u32 {
    green_time
        .saturating_add(YELLOW_SECS)
        .saturating_add(ALL_RED_SECS)
}

/// Phase shown for the given countdown.
///
/// `green_time` is accepted for signature symmetry with the rest of the
/// policy but does not shift the thresholds.
pub const fn determine_phase(countdown: u32, _green_time: u32) -> Phase {
    if countdown > YELLOW_FROM_COUNTDOWN {
        Phase::Green
    } else if countdown > RED_FROM_COUNTDOWN {
        Phase::Yellow
    } else {
        Phase::Red
    }
}

/// Score how well a signal's timing fits its demand, in `0..=100`.
///
/// Combines a timing match (actual vs. ideal green time), a bonus for
/// phases that suit the load, and a penalty for starving heavy traffic.
pub fn calculate_efficiency(vehicle_count: u32, green_time: u32, current_phase: Phase) -> u32 {
    let ideal = calculate_green_time(vehicle_count);
    let timing_score = timing_match_score(green_time, ideal);

    let mut phase_bonus: u32 = 0;
    if vehicle_count > 40 && current_phase == Phase::Green {
        phase_bonus = phase_bonus.saturating_add(10);
    }
    if vehicle_count < 10 && current_phase == Phase::Red {
        phase_bonus = phase_bonus.saturating_add(5);
    }

    let throughput_penalty: u32 = if vehicle_count > 50 && green_time < 45 {
        20
    } else if vehicle_count > 30 && green_time < 25 {
        15
    } else {
        0
    };

    timing_score
        .saturating_add(phase_bonus)
        .saturating_sub(throughput_penalty)
        .min(100)
}

/// `round(100 * min / max)` in integer arithmetic, 100 when `ideal` is 0.
fn timing_match_score(green_time: u32, ideal: u32) -> u32 {
    if ideal == 0 {
        return 100;
    }
    let lo = u64::from(green_time.min(ideal));
    let hi = u64::from(green_time.max(ideal));
    // (200 * lo + hi) / (2 * hi) rounds half up.
    let numerator = lo.saturating_mul(200).saturating_add(hi);
    let denominator = hi.saturating_mul(2);
    numerator
        .checked_div(denominator)
        .and_then(|score| u32::try_from(score).ok())
        .unwrap_or(100)
}
