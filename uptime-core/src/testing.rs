//! Fakes for exercising the engine without network or SMTP.

use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::{
    Error, Result,
    alert::Notifier,
    checker::{CheckResult, ErrorKind, Probe},
    models::{Monitor, MonitorStatus},
};

/// Builds the result a real probe would return for `status`.
pub fn check_result(url: &str, status: MonitorStatus) -> CheckResult {
    match status {
        MonitorStatus::Up => CheckResult {
            url: url.to_string(),
            status_code: 200,
            response_time: 150.0,
            status,
            dns_ok: true,
            ssl_ok: url.starts_with("https://"),
            error_kind: ErrorKind::None,
            error: String::new(),
        },
        _ => CheckResult {
            url: url.to_string(),
            status_code: 0,
            response_time: 30_000.0,
            status: MonitorStatus::Down,
            dns_ok: true,
            ssl_ok: url.starts_with("https://"),
            error_kind: ErrorKind::Timeout,
            error: "TIMEOUT: Request timed out - server did not respond in time".to_string(),
        },
    }
}

/// Returns queued statuses per monitor, then `Up` once a queue runs dry.
#[derive(Default)]
pub struct ScriptedProbe {
    queued: Mutex<HashMap<i32, VecDeque<MonitorStatus>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push(&self, monitor_id: i32, statuses: &[MonitorStatus]) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.entry(monitor_id).or_default().extend(statuses.iter().copied());
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, monitor: &Monitor) -> CheckResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let status = self
            .queued
            .lock()
            .ok()
            .and_then(|mut queued| {
                let next = queued.get_mut(&monitor.id).and_then(VecDeque::pop_front);
                next
            })
            .unwrap_or(MonitorStatus::Up);
        check_result(&monitor.url, status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
}

/// Records every send; addresses registered with `fail_for` are rejected.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    failing: Mutex<HashSet<String>>,
    attempts: AtomicUsize,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, address: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(address.to_string());
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .failing
            .lock()
            .map(|f| f.contains(to))
            .unwrap_or(false);
        if rejected {
            return Err(Error::notification(format!("mailbox unavailable: {to}")));
        }
        self.sent
            .lock()
            .map_err(|_| Error::internal("notifier lock poisoned"))?
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
            });
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
