use super::*;
use crate::{
    store::InMemoryStore,
    testing::{RecordingNotifier, check_result},
};
use uuid::Uuid;

struct Fixture {
    store: Arc<InMemoryStore>,
    notifier: Arc<RecordingNotifier>,
    dispatcher: AlertDispatcher,
    monitor: Monitor,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let monitor = Monitor::new(3, Uuid::new_v4(), "https://example.com", 60);
    store.insert_monitor(monitor.clone()).unwrap();
    let dispatcher = AlertDispatcher::new(store.clone(), notifier.clone());
    Fixture {
        store,
        notifier,
        dispatcher,
        monitor,
    }
}

#[tokio::test]
async fn test_every_contact_is_notified_once() {
    let f = fixture();
    f.store.add_contact(f.monitor.user_id, "Ops", "ops@example.com").unwrap();
    f.store.add_contact(f.monitor.user_id, "Dev", "dev@example.com").unwrap();
    f.store.add_contact(Uuid::new_v4(), "Stranger", "other@example.com").unwrap();

    let result = check_result(&f.monitor.url, MonitorStatus::Down);
    let report = f
        .dispatcher
        .dispatch(&f.monitor, MonitorStatus::Up, MonitorStatus::Down, &result)
        .await
        .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 2);
    let recipients: Vec<String> = f.notifier.sent().into_iter().map(|s| s.to).collect();
    assert_eq!(recipients, vec!["ops@example.com", "dev@example.com"]);
    assert!(f.notifier.sent()[0].subject.ends_with("DOWN"));
}

#[tokio::test]
async fn test_one_failed_delivery_does_not_block_others() {
    let f = fixture();
    f.store.add_contact(f.monitor.user_id, "Broken", "broken@example.com").unwrap();
    f.store.add_contact(f.monitor.user_id, "Ops", "ops@example.com").unwrap();
    f.notifier.fail_for("broken@example.com");

    let result = check_result(&f.monitor.url, MonitorStatus::Up);
    let report = f
        .dispatcher
        .dispatch(&f.monitor, MonitorStatus::Down, MonitorStatus::Up, &result)
        .await
        .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(f.notifier.attempts(), 2);
    assert_eq!(f.store.alerts_for(3).unwrap().len(), 1);
}

#[tokio::test]
async fn test_single_record_matches_new_status() {
    let f = fixture();
    f.store.add_contact(f.monitor.user_id, "Ops", "ops@example.com").unwrap();

    let result = check_result(&f.monitor.url, MonitorStatus::Up);
    f.dispatcher
        .dispatch(&f.monitor, MonitorStatus::Down, MonitorStatus::Up, &result)
        .await
        .unwrap();

    let alerts = f.store.alerts_for(3).unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Up);
    assert_eq!(
        alerts[0].message,
        "Monitor https://example.com is now up (was down). Status Code: 200, Response Time: 150ms"
    );
}

#[tokio::test]
async fn test_record_written_without_contacts() {
    let f = fixture();

    let result = check_result(&f.monitor.url, MonitorStatus::Down);
    let report = f
        .dispatcher
        .dispatch(&f.monitor, MonitorStatus::Up, MonitorStatus::Down, &result)
        .await
        .unwrap();

    assert_eq!(report.attempted, 0);
    assert_eq!(report.record.alert_type, AlertType::Down);
    assert!(report.record.message.contains("TIMEOUT"));
}

#[tokio::test]
async fn test_unknown_target_status_is_rejected() {
    let f = fixture();

    let result = check_result(&f.monitor.url, MonitorStatus::Up);
    let outcome = f
        .dispatcher
        .dispatch(&f.monitor, MonitorStatus::Up, MonitorStatus::Unknown, &result)
        .await;

    assert!(outcome.is_err());
    assert!(f.store.alerts_for(3).unwrap().is_empty());
}
