use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    Result,
    checker::CheckResult,
    models::{CheckLog, Monitor, MonitorStatus, NewCheckLog},
    store::MonitorStore,
};

/// A change between two defined statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: MonitorStatus,
    pub to: MonitorStatus,
}

#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub log: CheckLog,
    pub previous: MonitorStatus,
    pub transition: Option<Transition>,
}

/// Records every probe and decides whether it moved the monitor between `up` and `down`.
pub struct StatusTracker {
    store: Arc<dyn MonitorStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn MonitorStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, monitor: &Monitor, result: &CheckResult) -> Result<TrackOutcome> {
        // Read before anything of this cycle is written.
        let previous = self.store.current_status(monitor.id).await?;

        let log = self
            .store
            .append_check_log(NewCheckLog {
                monitor_id: monitor.id,
                status_code: i32::from(result.status_code),
                response_time: result.response_time,
                dns_ok: result.dns_ok,
                ssl_ok: result.ssl_ok,
                content_ok: result.is_up(),
                screenshot_url: None,
            })
            .await?;

        let current = result.status;
        let transition = if previous == current {
            None
        } else {
            // The CAS makes sure only one writer observes `previous -> current`.
            let won = self.store.update_status(monitor.id, previous, current).await?;
            if !won {
                debug!(monitor_id = monitor.id, "Status changed concurrently, not treating as a transition");
                None
            } else if previous.is_known() {
                info!(monitor_id = monitor.id, from = %previous, to = %current, "Monitor status transition");
                Some(Transition { from: previous, to: current })
            } else {
                info!(monitor_id = monitor.id, status = %current, "First observation recorded");
                None
            }
        };

        Ok(TrackOutcome {
            log,
            previous,
            transition,
        })
    }
}
