//! Simulated vehicle demand.
//!
//! Drawing a vehicle count is the only non-deterministic step in the
//! timing core. It sits behind [`VehicleSource`] so tests and replays can
//! substitute a fixed sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fewest vehicles a simulated draw can produce.
pub const MIN_SIMULATED_VEHICLES: u32 = 1;

/// Most vehicles a simulated draw can produce.
pub const MAX_SIMULATED_VEHICLES: u32 = 80;

/// A source of simulated vehicle counts.
pub trait VehicleSource: Send {
    /// Draw the next vehicle count.
    fn next_count(&mut self) -> u32;
}

/// Uniform random counts in `MIN_SIMULATED_VEHICLES..=MAX_SIMULATED_VEHICLES`.
#[derive(Debug, Clone)]
pub struct RandomVehicleSource {
    rng: StdRng,
}

impl RandomVehicleSource {
    /// Create a source seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Create a reproducible source from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomVehicleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleSource for RandomVehicleSource {
    fn next_count(&mut self) -> u32 {
        self.rng
            .random_range(MIN_SIMULATED_VEHICLES..=MAX_SIMULATED_VEHICLES)
    }
}

/// Replays a fixed sequence of counts, wrapping around at the end.
///
/// An empty script always yields [`MIN_SIMULATED_VEHICLES`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedVehicleSource {
    counts: Vec<u32>,
    cursor: usize,
}

impl ScriptedVehicleSource {
    /// Create a source that replays `counts` in order.
    pub const fn new(counts: Vec<u32>) -> Self {
        Self { counts, cursor: 0 }
    }
}

impl VehicleSource for ScriptedVehicleSource {
    fn next_count(&mut self) -> u32 {
        let Some(&count) = self.counts.get(self.cursor) else {
            return MIN_SIMULATED_VEHICLES;
        };
        self.cursor = self
            .cursor
            .saturating_add(1)
            .checked_rem(self.counts.len())
            .unwrap_or(0);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_counts_stay_in_range() {
        let mut source = RandomVehicleSource::seeded(42);
        for _ in 0..10_000 {
            let count = source.next_count();
            assert!((MIN_SIMULATED_VEHICLES..=MAX_SIMULATED_VEHICLES).contains(&count));
        }
    }

    #[test]
    fn random_counts_reach_both_bounds() {
        let mut source = RandomVehicleSource::seeded(7);
        let draws: Vec<u32> = (0..10_000).map(|_| source.next_count()).collect();
        assert!(draws.contains(&MIN_SIMULATED_VEHICLES));
        assert!(draws.contains(&MAX_SIMULATED_VEHICLES));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomVehicleSource::seeded(99);
        let mut b = RandomVehicleSource::seeded(99);
        for _ in 0..100 {
            assert_eq!(a.next_count(), b.next_count());
        }
    }

    #[test]
    fn scripted_source_wraps() {
        let mut source = ScriptedVehicleSource::new(vec![5, 50]);
        assert_eq!(source.next_count(), 5);
        assert_eq!(source.next_count(), 50);
        assert_eq!(source.next_count(), 5);
    }

    #[test]
    fn empty_script_yields_minimum() {
        let mut source = ScriptedVehicleSource::default();
        assert_eq!(source.next_count(), MIN_SIMULATED_VEHICLES);
    }
}
