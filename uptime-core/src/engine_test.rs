use crate::{
    engine::{MonitorEngine, MonitorLocks},
    models::{AlertType, Monitor, MonitorStatus},
    store::{InMemoryStore, MonitorStore},
    testing::{RecordingNotifier, ScriptedProbe},
};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use MonitorStatus::{Down, Up};

struct Harness {
    store: Arc<InMemoryStore>,
    probe: Arc<ScriptedProbe>,
    notifier: Arc<RecordingNotifier>,
    engine: Arc<MonitorEngine>,
    monitor: Monitor,
}

fn harness_with(probe: ScriptedProbe, contacts: &[&str]) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let probe = Arc::new(probe);
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = Monitor::new(11, Uuid::new_v4(), "https://example.com", 60);
    store.insert_monitor(monitor.clone()).unwrap();
    for (i, email) in contacts.iter().enumerate() {
        store
            .add_contact(monitor.user_id, &format!("contact-{i}"), email)
            .unwrap();
    }
    let engine = Arc::new(MonitorEngine::new(probe.clone(), store.clone(), notifier.clone()));
    Harness {
        store,
        probe,
        notifier,
        engine,
        monitor,
    }
}

fn harness(contacts: &[&str]) -> Harness {
    harness_with(ScriptedProbe::new(), contacts)
}

impl Harness {
    async fn run(&self, statuses: &[MonitorStatus]) {
        self.probe.push(self.monitor.id, statuses);
        for _ in statuses {
            self.engine.perform_check(&self.monitor).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_every_probe_writes_one_log() {
    let h = harness(&["ops@example.com"]);
    h.run(&[Up, Up, Down, Down, Up]).await;

    assert_eq!(h.store.logs_for(11).unwrap().len(), 5);
}

#[tokio::test]
async fn test_first_probe_never_alerts() {
    for first in [Up, Down] {
        let h = harness(&["ops@example.com"]);
        h.run(&[first]).await;

        assert!(h.store.alerts_for(11).unwrap().is_empty());
        assert_eq!(h.notifier.attempts(), 0);
        assert_eq!(h.store.current_status(11).await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_steady_status_produces_no_alerts() {
    let h = harness(&["ops@example.com"]);
    h.run(&[Up, Up]).await;

    assert_eq!(h.store.logs_for(11).unwrap().len(), 2);
    assert!(h.store.alerts_for(11).unwrap().is_empty());
}

#[tokio::test]
async fn test_timeout_after_up_alerts_every_contact_once() {
    let h = harness(&["ops@example.com", "dev@example.com"]);
    h.run(&[Up]).await;

    h.probe.push(11, &[Down]);
    let result = h.engine.perform_check(&h.monitor).await.unwrap();

    assert_eq!(result.status, Down);
    assert_eq!(result.status_code, 0);
    assert!(result.error.starts_with("TIMEOUT"));

    let alerts = h.store.alerts_for(11).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Down);
    assert_eq!(h.notifier.attempts(), 2);
}

#[tokio::test]
async fn test_each_transition_alerts_once() {
    let h = harness(&["ops@example.com"]);
    h.run(&[Up, Down, Down, Up, Up, Down]).await;

    let types: Vec<AlertType> = h
        .store
        .alerts_for(11)
        .unwrap()
        .iter()
        .map(|a| a.alert_type)
        .collect();
    assert_eq!(types, vec![AlertType::Down, AlertType::Up, AlertType::Down]);
    assert_eq!(h.notifier.attempts(), 3);
}

#[tokio::test]
async fn test_transition_updates_alert_state() {
    let h = harness(&[]);
    h.run(&[Up, Down]).await;

    let stored = h.store.monitor(11).unwrap().unwrap();
    assert_eq!(stored.status, Down);
    assert_eq!(stored.last_status, Some(Down));
    assert!(stored.last_alert_sent_at.is_some());
}

#[tokio::test]
async fn test_first_observation_leaves_alert_state_untouched() {
    let h = harness(&[]);
    h.run(&[Down]).await;

    let stored = h.store.monitor(11).unwrap().unwrap();
    assert_eq!(stored.last_status, None);
    assert!(stored.last_alert_sent_at.is_none());
}

#[tokio::test]
async fn test_delivery_failure_is_not_a_check_failure() {
    let h = harness(&["broken@example.com", "ops@example.com"]);
    h.notifier.fail_for("broken@example.com");
    h.run(&[Up]).await;

    h.probe.push(11, &[Down]);
    assert!(h.engine.perform_check(&h.monitor).await.is_ok());
    assert_eq!(h.store.alerts_for(11).unwrap().len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_propagates() {
    let h = harness(&["ops@example.com"]);
    h.run(&[Up]).await;
    h.store.set_fail_writes(true);

    h.probe.push(11, &[Down]);
    assert!(h.engine.perform_check(&h.monitor).await.is_err());
    assert!(h.store.alerts_for(11).unwrap().is_empty());
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test]
async fn test_concurrent_checks_of_one_monitor_alert_once() {
    let h = harness(&["ops@example.com"]);
    h.run(&[Up]).await;
    h.probe.push(11, &[Down; 8]);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = h.engine.clone();
        let monitor = h.monitor.clone();
        handles.push(tokio::spawn(async move { engine.perform_check(&monitor).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.store.logs_for(11).unwrap().len(), 9);
    assert_eq!(h.store.alerts_for(11).unwrap().len(), 1);
    assert_eq!(h.notifier.attempts(), 1);
}

#[tokio::test]
async fn test_busy_monitor_is_skipped_when_idle_check_requested() {
    let h = harness_with(ScriptedProbe::with_delay(Duration::from_millis(300)), &[]);

    let engine = h.engine.clone();
    let monitor = h.monitor.clone();
    let running = tokio::spawn(async move { engine.perform_check(&monitor).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let skipped = h.engine.perform_check_if_idle(&h.monitor).await.unwrap();
    assert!(skipped.is_none());

    running.await.unwrap().unwrap();
    let ran = h.engine.perform_check_if_idle(&h.monitor).await.unwrap();
    assert!(ran.is_some());
    assert_eq!(h.probe.calls(), 2);
}

#[tokio::test]
async fn test_failed_alert_write_is_retried_on_next_check() {
    let h = harness(&["ops@example.com"]);
    h.run(&[Up]).await;

    h.store.fail_next_alert_appends(1);
    h.probe.push(11, &[Down]);
    assert!(h.engine.perform_check(&h.monitor).await.is_err());
    assert_eq!(h.store.current_status(11).await.unwrap(), Up);
    assert!(h.store.alerts_for(11).unwrap().is_empty());

    h.run(&[Down]).await;

    let alerts = h.store.alerts_for(11).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Down);
    let stored = h.store.monitor(11).unwrap().unwrap();
    assert_eq!(stored.status, Down);
    assert_eq!(stored.last_status, Some(Down));
    assert!(stored.last_alert_sent_at.is_some());
    assert_eq!(h.store.logs_for(11).unwrap().len(), 3);
}

#[tokio::test]
async fn test_lock_entries_are_dropped_once_released() {
    let locks = MonitorLocks::default();
    for id in 0..100 {
        let _guard = locks.acquire(id).await.unwrap();
        assert_eq!(locks.len(), 1);
    }
    assert!(locks.is_empty());

    let held = locks.try_acquire(7).unwrap().unwrap();
    assert!(locks.try_acquire(7).unwrap().is_none());
    drop(held);
    assert!(locks.is_empty());
}

#[tokio::test]
async fn test_lock_entry_survives_while_a_waiter_is_queued() {
    let locks = Arc::new(MonitorLocks::default());
    let held = locks.acquire(3).await.unwrap();

    let queued = locks.clone();
    let waiter = tokio::spawn(async move {
        let _guard = queued.acquire(3).await.unwrap();
        queued.len()
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(held);

    assert_eq!(waiter.await.unwrap(), 1);
    assert!(locks.is_empty());
}
