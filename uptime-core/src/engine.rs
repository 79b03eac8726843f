use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    Error, Result,
    alert::{AlertDispatcher, Notifier},
    checker::{CheckResult, Probe},
    models::Monitor,
    store::MonitorStore,
    tracker::{StatusTracker, Transition},
};

/// One lock per monitor id so that two checks of the same monitor never interleave.
/// An entry is dropped once no guard or waiter refers to it.
#[derive(Default)]
pub struct MonitorLocks {
    locks: Mutex<HashMap<i32, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one check cycle.
pub struct MonitorGuard<'a> {
    monitor_id: i32,
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a MonitorLocks,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.prune(self.monitor_id);
    }
}

impl MonitorLocks {
    fn slot(&self, monitor_id: i32) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::internal("monitor lock table poisoned"))?;
        Ok(locks.entry(monitor_id).or_default().clone())
    }

    fn prune(&self, monitor_id: i32) {
        if let Ok(mut locks) = self.locks.lock() {
            // Only the table itself still holds an idle entry.
            if locks
                .get(&monitor_id)
                .is_some_and(|slot| Arc::strong_count(slot) == 1)
            {
                locks.remove(&monitor_id);
            }
        }
    }

    fn guard(&self, monitor_id: i32, guard: OwnedMutexGuard<()>) -> MonitorGuard<'_> {
        MonitorGuard {
            monitor_id,
            guard: Some(guard),
            locks: self,
        }
    }

    pub async fn acquire(&self, monitor_id: i32) -> Result<MonitorGuard<'_>> {
        let guard = self.slot(monitor_id)?.lock_owned().await;
        Ok(self.guard(monitor_id, guard))
    }

    pub fn try_acquire(&self, monitor_id: i32) -> Result<Option<MonitorGuard<'_>>> {
        Ok(self
            .slot(monitor_id)?
            .try_lock_owned()
            .ok()
            .map(|guard| self.guard(monitor_id, guard)))
    }

    /// Monitors with a check running or waiting.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs the full check cycle: probe, record, and alert on a transition.
pub struct MonitorEngine {
    probe: Arc<dyn Probe>,
    store: Arc<dyn MonitorStore>,
    tracker: StatusTracker,
    dispatcher: AlertDispatcher,
    locks: MonitorLocks,
}

impl MonitorEngine {
    pub fn new(
        probe: Arc<dyn Probe>,
        store: Arc<dyn MonitorStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            probe,
            tracker: StatusTracker::new(store.clone()),
            dispatcher: AlertDispatcher::new(store.clone(), notifier),
            store,
            locks: MonitorLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn MonitorStore> {
        &self.store
    }

    /// Checks `monitor` now, waiting for any in-flight check of the same monitor.
    pub async fn perform_check(&self, monitor: &Monitor) -> Result<CheckResult> {
        let _guard = self.locks.acquire(monitor.id).await?;
        self.run_cycle(monitor).await
    }

    /// Like [`perform_check`](Self::perform_check) but returns `None` instead of
    /// waiting when the monitor is already being checked.
    pub async fn perform_check_if_idle(&self, monitor: &Monitor) -> Result<Option<CheckResult>> {
        let Some(_guard) = self.locks.try_acquire(monitor.id)? else {
            debug!(monitor_id = monitor.id, "Previous check still running, skipping");
            return Ok(None);
        };
        self.run_cycle(monitor).await.map(Some)
    }

    async fn run_cycle(&self, monitor: &Monitor) -> Result<CheckResult> {
        let result = self.probe.probe(monitor).await;
        let outcome = self.tracker.record(monitor, &result).await?;

        if let Some(transition) = outcome.transition {
            if let Err(e) = self.announce(monitor, transition, &result).await {
                self.release_transition(monitor.id, transition).await;
                return Err(e);
            }
        }

        info!(
            monitor_id = monitor.id,
            url = %result.url,
            status = %result.status,
            status_code = result.status_code,
            response_time_ms = result.response_time as u64,
            "Check completed"
        );
        Ok(result)
    }

    async fn announce(
        &self,
        monitor: &Monitor,
        transition: Transition,
        result: &CheckResult,
    ) -> Result<()> {
        let report = self
            .dispatcher
            .dispatch(monitor, transition.from, transition.to, result)
            .await?;
        self.store
            .update_alert_state(monitor.id, transition.to, Utc::now())
            .await?;
        if report.failed > 0 {
            warn!(
                monitor_id = monitor.id,
                failed = report.failed,
                "Some alert deliveries failed and will not be retried"
            );
        }
        Ok(())
    }

    /// Puts the status back to `transition.from` so the next check sees the
    /// same transition again.
    async fn release_transition(&self, monitor_id: i32, transition: Transition) {
        match self
            .store
            .update_status(monitor_id, transition.to, transition.from)
            .await
        {
            Ok(true) => warn!(
                monitor_id,
                from = %transition.from,
                to = %transition.to,
                "Alert not recorded, transition will be retried"
            ),
            Ok(false) => warn!(monitor_id, "Status moved on before the transition could be released"),
            Err(e) => error!(monitor_id, error = %e, "Failed to release unrecorded transition"),
        }
    }
}
