use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Semaphore, watch},
    time::Instant,
};
use tracing::{debug, error, warn};
use uptime_core::{MonitorEngine, models::Monitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The queue is full; the monitor is picked up again on its next tick.
    Rejected,
    ShuttingDown,
}

/// Bounded pool of check workers.
///
/// At most `max_concurrent` checks run at once and at most `capacity` checks
/// are queued or running. A queued check that has not started when shutdown
/// is signalled is dropped; a running one finishes on its own timeouts.
#[derive(Clone)]
pub struct CheckPool {
    engine: Arc<MonitorEngine>,
    workers: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    capacity: usize,
    shutdown: watch::Receiver<bool>,
}

struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CheckPool {
    pub fn new(
        engine: Arc<MonitorEngine>,
        max_concurrent: usize,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            workers: Arc::new(Semaphore::new(max_concurrent.max(1))),
            pending: Arc::new(AtomicUsize::new(0)),
            capacity: capacity.max(1),
            shutdown,
        }
    }

    pub fn engine(&self) -> &Arc<MonitorEngine> {
        &self.engine
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Checks queued or running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn submit(&self, monitor: Monitor) -> Submission {
        if self.is_shutting_down() {
            return Submission::ShuttingDown;
        }

        let reserved = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            warn!(
                monitor_id = monitor.id,
                capacity = self.capacity,
                "Check queue full, deferring monitor to its next tick"
            );
            return Submission::Rejected;
        }

        let slot = PendingSlot(self.pending.clone());
        let engine = self.engine.clone();
        let workers = self.workers.clone();
        let mut shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let _slot = slot;
            let _permit = tokio::select! {
                permit = workers.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = shutdown_requested(&mut shutdown) => {
                    debug!(monitor_id = monitor.id, "Dropping queued check on shutdown");
                    return;
                }
            };

            match engine.perform_check_if_idle(&monitor).await {
                Ok(Some(result)) => debug!(
                    monitor_id = monitor.id,
                    status = %result.status,
                    "Scheduled check finished"
                ),
                Ok(None) => {}
                Err(e) => error!(monitor_id = monitor.id, error = %e, "Scheduled check failed"),
            }
        });

        Submission::Queued
    }

    /// Waits until no checks are queued or running. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
