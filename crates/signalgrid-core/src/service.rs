//! Signal service: locked read-modify-write over a [`SignalStore`].
//!
//! Both the ticker and the HTTP API mutate signals through this type.
//! Every mutation takes the signal's own lock, re-reads the signal,
//! computes a [`Transition`] with the state machine, and hands the patch
//! plus optional snapshot to the store in a single call. Two writers to
//! the same signal therefore never interleave, while writers to
//! different signals never wait on each other.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signalgrid_types::{Analytics, HistorySnapshot, NewSignal, Signal, SignalId, SignalPatch};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::machine::{self, OverrideError, Transition};
use crate::simulator::VehicleSource;
use crate::store::{SignalStore, StoreError, blank_signal};

/// Relocation offsets (degrees) applied around a new center, in id order.
const RELOCATION_OFFSETS: [(f64, f64); 8] = [
    (0.005, 0.003),
    (-0.004, 0.006),
    (0.007, -0.004),
    (-0.006, -0.005),
    (0.003, 0.008),
    (-0.008, 0.002),
    (0.009, -0.007),
    (0.002, -0.009),
];

/// Maximum random jitter (degrees) added to each relocated coordinate.
const RELOCATION_JITTER: f64 = 0.001;

/// Errors surfaced by signal operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// No signal with this id exists. Nothing was changed.
    #[error("signal {0} not found")]
    NotFound(SignalId),

    /// The request was malformed. Rejected before any mutation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store failed; the operation can be retried.
    #[error("store unavailable: {0}")]
    Transient(String),
}

impl From<StoreError> for SignalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Transient(message) => Self::Transient(message),
        }
    }
}

impl From<OverrideError> for SignalError {
    fn from(err: OverrideError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Operator override fields. At least one must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideRequest {
    /// New demand; recomputes green time and density.
    pub vehicle_count: Option<u32>,
    /// Explicit green duration; applied after `vehicle_count`.
    pub green_time: Option<u32>,
}

/// What a single-signal tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The signal is in emergency mode and was left alone.
    Skipped,
    /// The countdown moved within the current cycle.
    Advanced,
    /// The cycle ended and a new one started with fresh demand.
    Rollover,
}

/// Registry of per-signal locks.
///
/// An entry lives only while some caller holds or waits on it, so ids
/// that never resolve to a signal do not accumulate.
#[derive(Debug, Default)]
struct SignalLocks {
    inner: StdMutex<BTreeMap<SignalId, Arc<Mutex<()>>>>,
}

impl SignalLocks {
    async fn acquire(&self, id: SignalId) -> SignalGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(id).or_default())
        };
        SignalGuard {
            id,
            registry: self,
            held: Some(lock.lock_owned().await),
        }
    }

    /// Drop the entry for `id` if nobody else references it.
    fn release(&self, id: SignalId) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&id);
        }
    }
}

/// Exclusive access to one signal. Releasing it prunes the registry.
struct SignalGuard<'a> {
    id: SignalId,
    registry: &'a SignalLocks,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for SignalGuard<'_> {
    fn drop(&mut self) {
        drop(self.held.take());
        self.registry.release(self.id);
    }
}

/// The single authority that turns operator and ticker events into
/// persisted signal state.
pub struct SignalService {
    store: Arc<dyn SignalStore>,
    vehicles: Mutex<Box<dyn VehicleSource>>,
    placement_rng: Mutex<StdRng>,
    locks: SignalLocks,
}

impl core::fmt::Debug for SignalService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SignalService").finish_non_exhaustive()
    }
}

impl SignalService {
    /// Create a service over `store`, drawing demand from `vehicles`.
    pub fn new(store: Arc<dyn SignalStore>, vehicles: Box<dyn VehicleSource>) -> Self {
        Self {
            store,
            vehicles: Mutex::new(vehicles),
            placement_rng: Mutex::new(StdRng::from_os_rng()),
            locks: SignalLocks::default(),
        }
    }

    /// Use a fixed seed for relocation jitter.
    #[must_use]
    pub fn with_placement_seed(mut self, seed: u64) -> Self {
        self.placement_rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// All signals, ordered by id.
    pub async fn list_signals(&self) -> Result<Vec<Signal>, SignalError> {
        Ok(self.store.list_signals().await?)
    }

    /// One signal by id.
    pub async fn get_signal(&self, id: SignalId) -> Result<Signal, SignalError> {
        Ok(self.store.get_signal(id).await?)
    }

    /// Recent history for a signal, oldest first.
    pub async fn history(
        &self,
        id: SignalId,
        limit: usize,
    ) -> Result<Vec<HistorySnapshot>, SignalError> {
        Ok(self.store.list_history(id, limit).await?)
    }

    /// Reporting rollups over the history log.
    pub async fn analytics(&self) -> Result<Analytics, SignalError> {
        Ok(self.store.analytics().await?)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create a signal and start its first cycle from the seed count.
    pub async fn create_signal(&self, new: &NewSignal) -> Result<Signal, SignalError> {
        validate_new_signal(new)?;
        let transition = machine::initialize_cycle(new.vehicle_count);
        let draft = blank_signal(SignalId::new(0), new);
        let snapshot = transition.snapshot_for(&draft, Utc::now());
        let signal = self
            .store
            .insert_signal(new, &transition.patch, snapshot.as_ref())
            .await?;
        info!(signal_id = %signal.id, name = %signal.name, "Signal created");
        Ok(signal)
    }

    /// Delete a signal together with its history.
    pub async fn delete_signal(&self, id: SignalId) -> Result<(), SignalError> {
        let _guard = self.locks.acquire(id).await;
        self.store.delete_signal(id).await?;
        info!(signal_id = %id, "Signal deleted");
        Ok(())
    }

    /// Insert `seeds` if the store holds no signals. Returns how many were
    /// created.
    pub async fn seed_if_empty(&self, seeds: &[NewSignal]) -> Result<usize, SignalError> {
        if !self.store.list_signals().await?.is_empty() {
            return Ok(0);
        }
        for seed in seeds {
            self.create_signal(seed).await?;
        }
        Ok(seeds.len())
    }

    /// Restart every non-emergency signal's cycle from its stored demand.
    ///
    /// Run once at startup so countdowns left over from a previous process
    /// do not resume mid-cycle.
    pub async fn initialize_all(&self) -> Result<usize, SignalError> {
        let mut initialized: usize = 0;
        for listed in self.store.list_signals().await? {
            let _guard = self.locks.acquire(listed.id).await;
            let signal = self.store.get_signal(listed.id).await?;
            if signal.emergency {
                continue;
            }
            let transition = machine::initialize_cycle(signal.vehicle_count);
            self.commit(&signal, &transition).await?;
            initialized = initialized.saturating_add(1);
        }
        Ok(initialized)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Advance one signal by `elapsed_secs`.
    pub async fn tick_signal(
        &self,
        id: SignalId,
        elapsed_secs: u32,
    ) -> Result<TickOutcome, SignalError> {
        let _guard = self.locks.acquire(id).await;
        let signal = self.store.get_signal(id).await?;

        let transition = {
            let mut vehicles = self.vehicles.lock().await;
            machine::tick(&signal, elapsed_secs, vehicles.as_mut())
        };
        let Some(transition) = transition else {
            return Ok(TickOutcome::Skipped);
        };

        self.commit(&signal, &transition).await?;
        if transition.snapshot {
            debug!(signal_id = %id, "Cycle rolled over");
            Ok(TickOutcome::Rollover)
        } else {
            Ok(TickOutcome::Advanced)
        }
    }

    /// Apply an operator override.
    pub async fn override_signal(
        &self,
        id: SignalId,
        request: OverrideRequest,
    ) -> Result<Signal, SignalError> {
        let transition = machine::apply_override(request.vehicle_count, request.green_time)?;

        let _guard = self.locks.acquire(id).await;
        let signal = self.store.get_signal(id).await?;
        let persisted = self.commit(&signal, &transition).await?;
        info!(
            signal_id = %id,
            vehicle_count = ?request.vehicle_count,
            green_time = ?request.green_time,
            "Signal overridden"
        );
        Ok(persisted)
    }

    /// Enter or leave emergency mode.
    pub async fn set_emergency(&self, id: SignalId, enabled: bool) -> Result<Signal, SignalError> {
        let _guard = self.locks.acquire(id).await;
        let signal = self.store.get_signal(id).await?;
        let transition = machine::set_emergency(&signal, enabled);
        let persisted = self.commit(&signal, &transition).await?;
        info!(signal_id = %id, enabled, "Emergency mode toggled");
        Ok(persisted)
    }

    /// Draw fresh demand for every non-emergency signal and restart its
    /// cycle. Emergency signals are returned unchanged.
    pub async fn simulate_all(&self) -> Result<Vec<Signal>, SignalError> {
        let listed = self.store.list_signals().await?;
        let mut results = Vec::with_capacity(listed.len());

        for entry in listed {
            let _guard = self.locks.acquire(entry.id).await;
            let signal = match self.store.get_signal(entry.id).await {
                Ok(signal) => signal,
                Err(StoreError::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };
            if signal.emergency {
                results.push(signal);
                continue;
            }
            let count = self.vehicles.lock().await.next_count();
            let transition = machine::initialize_cycle(count);
            results.push(self.commit(&signal, &transition).await?);
        }

        info!(signals = results.len(), "Vehicle counts re-simulated");
        Ok(results)
    }

    /// Spread every signal around a new center point.
    ///
    /// Uses a fixed offset pattern plus up to ±0.001° of jitter, rounded
    /// to six decimals. Timing fields are untouched.
    pub async fn relocate_all(&self, lat: f64, lng: f64) -> Result<Vec<Signal>, SignalError> {
        validate_coordinates(lat, lng)?;
        let listed = self.store.list_signals().await?;
        let mut results = Vec::with_capacity(listed.len());

        for (entry, (d_lat, d_lng)) in listed.iter().zip(RELOCATION_OFFSETS.iter().cycle()) {
            let (j_lat, j_lng) = {
                let mut rng = self.placement_rng.lock().await;
                (
                    rng.random_range(-RELOCATION_JITTER..=RELOCATION_JITTER),
                    rng.random_range(-RELOCATION_JITTER..=RELOCATION_JITTER),
                )
            };
            let patch = SignalPatch::Placement {
                lat: round_six_decimals(lat + d_lat + j_lat),
                lng: round_six_decimals(lng + d_lng + j_lng),
            };

            let _guard = self.locks.acquire(entry.id).await;
            match self.store.persist_signal(entry.id, &patch, None).await {
                Ok(signal) => results.push(signal),
                Err(StoreError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        info!(signals = results.len(), lat, lng, "Signals relocated");
        Ok(results)
    }

    /// Persist a transition for a signal read under its lock.
    async fn commit(
        &self,
        signal: &Signal,
        transition: &Transition,
    ) -> Result<Signal, SignalError> {
        let snapshot = transition.snapshot_for(signal, Utc::now());
        Ok(self
            .store
            .persist_signal(signal.id, &transition.patch, snapshot.as_ref())
            .await?)
    }
}

/// Check a new signal's fields before anything is stored.
///
/// # Errors
///
/// Returns [`SignalError::InvalidInput`] for a blank name or location, an
/// oversized vehicle count, or coordinates outside their ranges.
pub fn validate_new_signal(new: &NewSignal) -> Result<(), SignalError> {
    if new.name.trim().is_empty() {
        return Err(SignalError::InvalidInput("name must not be empty".to_owned()));
    }
    if new.location.trim().is_empty() {
        return Err(SignalError::InvalidInput(
            "location must not be empty".to_owned(),
        ));
    }
    machine::check_vehicle_count(new.vehicle_count)?;
    validate_coordinates(new.lat, new.lng)
}

fn validate_coordinates(lat: f64, lng: f64) -> Result<(), SignalError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(SignalError::InvalidInput(format!(
            "lat {lat} outside -90..=90"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(SignalError::InvalidInput(format!(
            "lng {lng} outside -180..=180"
        )));
    }
    Ok(())
}

fn round_six_decimals(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
