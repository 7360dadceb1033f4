//! Signal store abstraction and the in-memory implementation.
//!
//! The store owns the signal table and the append-only history log. Every
//! mutation arrives as a [`SignalPatch`], optionally paired with a
//! [`NewSnapshot`]; implementations must apply the pair atomically so a
//! failure never leaves a signal half-updated or a cycle unrecorded.
//!
//! Per-signal serialization of read-modify-write cycles is the caller's
//! job (see [`SignalService`](crate::service::SignalService)); the store
//! only guarantees that each individual call is all-or-nothing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use signalgrid_types::{
    Analytics, Density, HistoryId, HistorySnapshot, NewSignal, NewSnapshot, PeakReading, Phase,
    Signal, SignalId, SignalPatch, SignalRanking,
};
use tokio::sync::RwLock;

use crate::timing;

/// Errors surfaced by a [`SignalStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No signal with this id exists.
    #[error("signal {0} not found")]
    NotFound(SignalId),

    /// The backing store failed; the operation may be retried.
    #[error("store unavailable: {0}")]
    Transient(String),
}

/// Durable record of signals and their history.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// All signals, ordered by id.
    async fn list_signals(&self) -> Result<Vec<Signal>, StoreError>;

    /// One signal by id.
    async fn get_signal(&self, id: SignalId) -> Result<Signal, StoreError>;

    /// Create a signal with its initial timing and first snapshot.
    async fn insert_signal(
        &self,
        new: &NewSignal,
        timing: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, StoreError>;

    /// Delete a signal and all of its history.
    async fn delete_signal(&self, id: SignalId) -> Result<(), StoreError>;

    /// Apply a patch and append the snapshot (if any) in one atomic step.
    ///
    /// Returns the signal as persisted.
    async fn persist_signal(
        &self,
        id: SignalId,
        patch: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, StoreError>;

    /// The most recent `limit` snapshots for a signal, oldest first.
    ///
    /// Unknown signals yield an empty list.
    async fn list_history(
        &self,
        id: SignalId,
        limit: usize,
    ) -> Result<Vec<HistorySnapshot>, StoreError>;

    /// Reporting rollups over the whole history log.
    async fn analytics(&self) -> Result<Analytics, StoreError>;
}

/// Row defaults a new signal starts from before its first cycle.
pub fn blank_signal(id: SignalId, new: &NewSignal) -> Signal {
    Signal {
        id,
        name: new.name.clone(),
        location: new.location.clone(),
        lat: new.lat,
        lng: new.lng,
        vehicle_count: new.vehicle_count,
        green_time: timing::LOW_GREEN_SECS,
        density: Density::Low,
        current_phase: Phase::Green,
        countdown: timing::LOW_GREEN_SECS,
        emergency: false,
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Tables {
    signals: BTreeMap<SignalId, Signal>,
    history: Vec<HistorySnapshot>,
    last_signal_id: i64,
    last_history_id: i64,
}

impl Tables {
    fn append_history(&mut self, signal_id: SignalId, snapshot: &NewSnapshot) {
        self.last_history_id = self.last_history_id.saturating_add(1);
        self.history.push(HistorySnapshot {
            id: HistoryId::new(self.last_history_id),
            signal_id,
            timestamp: snapshot.timestamp,
            vehicle_count: snapshot.vehicle_count,
            green_time: snapshot.green_time,
            density: snapshot.density,
        });
    }
}

/// Process-local store backed by a single [`RwLock`].
///
/// Each call holds the write lock for its whole duration, which makes
/// patch + snapshot pairs atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn list_signals(&self) -> Result<Vec<Signal>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.signals.values().cloned().collect())
    }

    async fn get_signal(&self, id: SignalId) -> Result<Signal, StoreError> {
        let tables = self.tables.read().await;
        tables
            .signals
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_signal(
        &self,
        new: &NewSignal,
        timing: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, StoreError> {
        let mut tables = self.tables.write().await;
        tables.last_signal_id = tables.last_signal_id.saturating_add(1);
        let id = SignalId::new(tables.last_signal_id);

        let signal = timing.applied(&blank_signal(id, new));
        tables.signals.insert(id, signal.clone());
        if let Some(snapshot) = snapshot {
            tables.append_history(id, snapshot);
        }
        Ok(signal)
    }

    async fn delete_signal(&self, id: SignalId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.signals.remove(&id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        tables.history.retain(|row| row.signal_id != id);
        Ok(())
    }

    async fn persist_signal(
        &self,
        id: SignalId,
        patch: &SignalPatch,
        snapshot: Option<&NewSnapshot>,
    ) -> Result<Signal, StoreError> {
        let mut tables = self.tables.write().await;
        let signal = tables.signals.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        patch.apply_to(signal);
        let persisted = signal.clone();
        if let Some(snapshot) = snapshot {
            tables.append_history(id, snapshot);
        }
        Ok(persisted)
    }

    async fn list_history(
        &self,
        id: SignalId,
        limit: usize,
    ) -> Result<Vec<HistorySnapshot>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<HistorySnapshot> = tables
            .history
            .iter()
            .rev()
            .filter(|row| row.signal_id == id)
            .take(limit)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn analytics(&self) -> Result<Analytics, StoreError> {
        let tables = self.tables.read().await;
        Ok(summarize(&tables.signals, &tables.history))
    }
}

/// Per-signal accumulator for [`summarize`].
#[derive(Debug, Default)]
struct Rollup {
    count: u64,
    sum: u64,
    peak: u32,
    min: Option<u32>,
}

/// Build analytics from a full copy of the tables.
fn summarize(signals: &BTreeMap<SignalId, Signal>, history: &[HistorySnapshot]) -> Analytics {
    let mut rollups: BTreeMap<SignalId, Rollup> = BTreeMap::new();
    let mut density_distribution: BTreeMap<Density, u64> = BTreeMap::new();
    let mut total_sum: u64 = 0;
    let mut peak: Option<&HistorySnapshot> = None;

    for row in history {
        total_sum = total_sum.saturating_add(u64::from(row.vehicle_count));
        let slot = density_distribution.entry(row.density).or_insert(0);
        *slot = slot.saturating_add(1);

        if peak.is_none_or(|best| row.vehicle_count > best.vehicle_count) {
            peak = Some(row);
        }

        let rollup = rollups.entry(row.signal_id).or_default();
        rollup.count = rollup.count.saturating_add(1);
        rollup.sum = rollup.sum.saturating_add(u64::from(row.vehicle_count));
        rollup.peak = rollup.peak.max(row.vehicle_count);
        rollup.min = Some(rollup.min.map_or(row.vehicle_count, |m| m.min(row.vehicle_count)));
    }

    let total_snapshots = u64::try_from(history.len()).unwrap_or(u64::MAX);

    let mut signal_rankings: Vec<SignalRanking> = signals
        .values()
        .map(|signal| {
            let rollup = rollups.get(&signal.id);
            SignalRanking {
                id: signal.id,
                name: signal.name.clone(),
                total_snapshots: rollup.map_or(0, |r| r.count),
                avg_vehicles: rollup.map_or(0.0, |r| mean(r.sum, r.count)),
                peak_vehicles: rollup.map_or(0, |r| r.peak),
                min_vehicles: rollup.and_then(|r| r.min).unwrap_or(0),
            }
        })
        .collect();
    signal_rankings.sort_by(|a, b| b.avg_vehicles.total_cmp(&a.avg_vehicles));

    Analytics {
        total_snapshots,
        peak: peak.map(|row| PeakReading {
            signal_id: row.signal_id,
            vehicle_count: row.vehicle_count,
            timestamp: row.timestamp,
        }),
        average_vehicles: round_one_decimal(mean(total_sum, total_snapshots)),
        signal_rankings,
        density_distribution,
    }
}

/// Arithmetic mean, 0 for an empty set.
#[allow(clippy::cast_precision_loss)]
fn mean(sum: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

/// Round to one decimal place for display.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::machine;

    fn new_signal(name: &str, vehicle_count: u32) -> NewSignal {
        NewSignal {
            name: name.to_owned(),
            location: format!("{name} Junction"),
            lat: 11.0,
            lng: 76.9,
            vehicle_count,
        }
    }

    async fn insert(store: &MemoryStore, name: &str, vehicle_count: u32) -> Signal {
        let transition = machine::initialize_cycle(vehicle_count);
        let new = new_signal(name, vehicle_count);
        let snapshot =
            transition.snapshot_for(&blank_signal(SignalId::new(0), &new), Utc::now());
        store
            .insert_signal(&new, &transition.patch, snapshot.as_ref())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids_and_records_history() {
        let store = MemoryStore::new();
        let a = insert(&store, "Signal-A", 45).await;
        let b = insert(&store, "Signal-B", 5).await;

        assert_eq!(a.id, SignalId::new(1));
        assert_eq!(b.id, SignalId::new(2));
        assert_eq!(a.green_time, 70);
        assert_eq!(a.countdown, 80);

        let history = store.list_history(a.id, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].density, Density::High);
    }

    #[tokio::test]
    async fn persist_applies_patch_and_snapshot_together() {
        let store = MemoryStore::new();
        let signal = insert(&store, "Signal-A", 10).await;

        let transition = machine::override_green_time(60).unwrap();
        let snapshot = transition.snapshot_for(&signal, Utc::now());
        let persisted = store
            .persist_signal(signal.id, &transition.patch, snapshot.as_ref())
            .await
            .unwrap();

        assert_eq!(persisted.green_time, 60);
        assert_eq!(store.get_signal(signal.id).await.unwrap(), persisted);
        let history = store.list_history(signal.id, 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].green_time, 60);
    }

    #[tokio::test]
    async fn persist_unknown_signal_is_not_found() {
        let store = MemoryStore::new();
        let patch = machine::initialize_cycle(10).patch;
        let err = store
            .persist_signal(SignalId::new(9), &patch, None)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(SignalId::new(9)));
    }

    #[tokio::test]
    async fn delete_cascades_to_history() {
        let store = MemoryStore::new();
        let a = insert(&store, "Signal-A", 10).await;
        let b = insert(&store, "Signal-B", 30).await;

        store.delete_signal(a.id).await.unwrap();

        assert!(store.get_signal(a.id).await.is_err());
        assert!(store.list_history(a.id, 50).await.unwrap().is_empty());
        assert_eq!(store.list_history(b.id, 50).await.unwrap().len(), 1);
        assert_eq!(
            store.delete_signal(a.id).await.unwrap_err(),
            StoreError::NotFound(a.id)
        );
    }

    #[tokio::test]
    async fn history_limit_keeps_most_recent_oldest_first() {
        let store = MemoryStore::new();
        let signal = insert(&store, "Signal-A", 1).await;
        for count in 2..=5 {
            let transition = machine::override_vehicle_count(count);
            let snapshot = transition.snapshot_for(&signal, Utc::now());
            store
                .persist_signal(signal.id, &transition.patch, snapshot.as_ref())
                .await
                .unwrap();
        }

        let rows = store.list_history(signal.id, 3).await.unwrap();
        let counts: Vec<u32> = rows.iter().map(|r| r.vehicle_count).collect();
        assert_eq!(counts, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn analytics_rolls_up_history() {
        let store = MemoryStore::new();
        let a = insert(&store, "Signal-A", 10).await;
        let _b = insert(&store, "Signal-B", 60).await;
        let _c = insert(&store, "Signal-C", 0).await;

        let transition = machine::override_vehicle_count(30);
        let snapshot = transition.snapshot_for(&a, Utc::now());
        store
            .persist_signal(a.id, &transition.patch, snapshot.as_ref())
            .await
            .unwrap();

        let analytics = store.analytics().await.unwrap();
        assert_eq!(analytics.total_snapshots, 4);
        assert_eq!(analytics.average_vehicles, 25.0);

        let peak = analytics.peak.unwrap();
        assert_eq!(peak.vehicle_count, 60);
        assert_eq!(peak.signal_id, SignalId::new(2));

        assert_eq!(analytics.signal_rankings[0].name, "Signal-B");
        assert_eq!(analytics.signal_rankings[1].name, "Signal-A");
        assert_eq!(analytics.signal_rankings[1].avg_vehicles, 20.0);
        assert_eq!(analytics.signal_rankings[1].min_vehicles, 10);
        assert_eq!(analytics.signal_rankings[1].peak_vehicles, 30);

        assert_eq!(analytics.density_distribution.get(&Density::Low), Some(&2));
        assert_eq!(analytics.density_distribution.get(&Density::Medium), Some(&1));
        assert_eq!(analytics.density_distribution.get(&Density::High), Some(&1));
    }

    #[tokio::test]
    async fn analytics_on_empty_store() {
        let store = MemoryStore::new();
        let analytics = store.analytics().await.unwrap();
        assert_eq!(analytics.total_snapshots, 0);
        assert!(analytics.peak.is_none());
        assert_eq!(analytics.average_vehicles, 0.0);
        assert!(analytics.signal_rankings.is_empty());
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round_one_decimal(40.56), 40.6);
        assert_eq!(round_one_decimal(12.0), 12.0);
    }
}
