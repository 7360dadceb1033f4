//! Periodic tick loop.
//!
//! Every `interval_secs` the ticker walks all signals and advances each
//! non-emergency signal by exactly `interval_secs`. Each signal is ticked
//! through [`SignalService::tick_signal`], so a tick never overwrites a
//! concurrent override or emergency toggle. A failure on one signal is
//! logged and the pass moves on to the next signal.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::service::{SignalError, SignalService, TickOutcome};

/// What one pass over all signals did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Pass number, starting at 1.
    pub pass: u64,
    /// Signals whose countdown moved within the cycle.
    pub advanced: u32,
    /// Signals that finished a cycle and started a new one.
    pub rollovers: u32,
    /// Signals left alone because they are in emergency mode.
    pub skipped_emergency: u32,
    /// Signals whose tick failed. The pass continued past them.
    pub failures: u32,
}

/// Run a single pass, advancing every signal by `elapsed_secs`.
pub async fn run_pass(service: &SignalService, elapsed_secs: u32, pass: u64) -> TickSummary {
    let mut summary = TickSummary {
        pass,
        ..TickSummary::default()
    };

    let signals = match service.list_signals().await {
        Ok(signals) => signals,
        Err(err) => {
            warn!(pass, error = %err, "Tick pass could not list signals");
            summary.failures = summary.failures.saturating_add(1);
            return summary;
        }
    };

    for signal in signals {
        if signal.emergency {
            summary.skipped_emergency = summary.skipped_emergency.saturating_add(1);
            continue;
        }
        match service.tick_signal(signal.id, elapsed_secs).await {
            Ok(TickOutcome::Advanced) => summary.advanced = summary.advanced.saturating_add(1),
            Ok(TickOutcome::Rollover) => summary.rollovers = summary.rollovers.saturating_add(1),
            Ok(TickOutcome::Skipped) => {
                summary.skipped_emergency = summary.skipped_emergency.saturating_add(1);
            }
            // Deleted between the listing and the tick.
            Err(SignalError::NotFound(_)) => {}
            Err(err) => {
                warn!(pass, signal_id = %signal.id, error = %err, "Signal tick failed");
                summary.failures = summary.failures.saturating_add(1);
            }
        }
    }

    debug!(
        pass,
        advanced = summary.advanced,
        rollovers = summary.rollovers,
        skipped_emergency = summary.skipped_emergency,
        failures = summary.failures,
        "Tick pass complete"
    );
    summary
}

/// Tick all signals every `interval_secs` until `shutdown` flips to `true`
/// or its sender is dropped.
///
/// Returns the number of passes that ran.
pub async fn run_ticker(
    service: Arc<SignalService>,
    interval_secs: u32,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let interval = Duration::from_secs(u64::from(interval_secs.max(1)));
    let mut passes: u64 = 0;

    info!(interval_secs, "Ticker starting");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            () = sleep(interval) => {
                passes = passes.saturating_add(1);
                run_pass(&service, interval_secs, passes).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(passes, "Ticker stopped");
    passes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use signalgrid_types::{
        Analytics, HistorySnapshot, NewSignal, NewSnapshot, Phase, Signal, SignalId, SignalPatch,
    };

    use super::*;
    use crate::machine::EMERGENCY_COUNTDOWN;
    use crate::simulator::ScriptedVehicleSource;
    use crate::store::{MemoryStore, SignalStore, StoreError};

    /// Delegates to a [`MemoryStore`] but refuses writes for one signal.
    struct FlakyStore {
        inner: MemoryStore,
        broken: SignalId,
    }

    #[async_trait]
    impl SignalStore for FlakyStore {
        async fn list_signals(&self) -> Result<Vec<Signal>, StoreError> {
            self.inner.list_signals().await
        }

        async fn get_signal(&self, id: SignalId) -> Result<Signal, StoreError> {
            self.inner.get_signal(id).await
        }

        async fn insert_signal(
            &self,
            new: &NewSignal,
            patch: &SignalPatch,
            snapshot: Option<&NewSnapshot>,
        ) -> Result<Signal, StoreError> {
            self.inner.insert_signal(new, patch, snapshot).await
        }

        async fn delete_signal(&self, id: SignalId) -> Result<(), StoreError> {
            self.inner.delete_signal(id).await
        }

        async fn persist_signal(
            &self,
            id: SignalId,
            patch: &SignalPatch,
            snapshot: Option<&NewSnapshot>,
        ) -> Result<Signal, StoreError> {
            if id == self.broken {
                return Err(StoreError::Transient("disk on fire".to_owned()));
            }
            self.inner.persist_signal(id, patch, snapshot).await
        }

        async fn list_history(
            &self,
            id: SignalId,
            limit: usize,
        ) -> Result<Vec<HistorySnapshot>, StoreError> {
            self.inner.list_history(id, limit).await
        }

        async fn analytics(&self) -> Result<Analytics, StoreError> {
            self.inner.analytics().await
        }
    }

    fn new_signal(name: &str, vehicle_count: u32) -> NewSignal {
        NewSignal {
            name: name.to_owned(),
            location: "Gandhipuram".to_owned(),
            lat: 11.0168,
            lng: 76.9558,
            vehicle_count,
        }
    }

    fn make_service(store: Arc<dyn SignalStore>) -> Arc<SignalService> {
        Arc::new(SignalService::new(
            store,
            Box::new(ScriptedVehicleSource::new(vec![10])),
        ))
    }

    #[tokio::test]
    async fn pass_advances_every_signal() {
        let service = make_service(Arc::new(MemoryStore::new()));
        let a = service.create_signal(&new_signal("Signal-A", 0)).await.unwrap();
        let b = service.create_signal(&new_signal("Signal-B", 45)).await.unwrap();

        let summary = run_pass(&service, 3, 1).await;
        assert_eq!(summary.advanced, 2);
        assert_eq!(summary.failures, 0);
        assert_eq!(service.get_signal(a.id).await.unwrap().countdown, 32);
        assert_eq!(service.get_signal(b.id).await.unwrap().countdown, 77);
    }

    #[tokio::test]
    async fn one_failing_signal_does_not_stop_the_pass() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken: SignalId::new(1),
        });
        let service = make_service(store);
        // Inserts still succeed; only updates to signal 1 fail.
        let a = service.create_signal(&new_signal("Signal-A", 0)).await.unwrap();
        let b = service.create_signal(&new_signal("Signal-B", 0)).await.unwrap();
        assert_eq!(a.id, SignalId::new(1));

        let summary = run_pass(&service, 3, 1).await;
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.advanced, 1);
        assert_eq!(service.get_signal(a.id).await.unwrap().countdown, 35);
        assert_eq!(service.get_signal(b.id).await.unwrap().countdown, 32);
    }

    #[tokio::test]
    async fn emergency_signal_is_untouched_across_passes() {
        let service = make_service(Arc::new(MemoryStore::new()));
        let a = service.create_signal(&new_signal("Signal-A", 0)).await.unwrap();
        let b = service.create_signal(&new_signal("Signal-B", 0)).await.unwrap();
        let pinned = service.set_emergency(b.id, true).await.unwrap();

        let mut rollovers: u32 = 0;
        for pass in 1..=40_u64 {
            let summary = run_pass(&service, 3, pass).await;
            assert_eq!(summary.skipped_emergency, 1);
            rollovers = rollovers.saturating_add(summary.rollovers);
        }

        let b_now = service.get_signal(b.id).await.unwrap();
        assert_eq!(b_now, pinned);
        assert_eq!(b_now.countdown, EMERGENCY_COUNTDOWN);
        assert_eq!(b_now.current_phase, Phase::Green);
        assert!(rollovers > 0);
        assert_eq!(
            service.history(a.id, 100).await.unwrap().len(),
            usize::try_from(rollovers).unwrap().saturating_add(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_runs_on_interval_until_shutdown() {
        let service = make_service(Arc::new(MemoryStore::new()));
        let a = service.create_signal(&new_signal("Signal-A", 0)).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_ticker(Arc::clone(&service), 3, rx));

        sleep(Duration::from_secs(10)).await;
        tx.send(true).unwrap();
        let passes = handle.await.unwrap();

        assert_eq!(passes, 3);
        assert_eq!(service.get_signal(a.id).await.unwrap().countdown, 26);
    }
}
