//! Fan-out of status transitions to the monitor owner's contacts.
//!
//! Delivery is at most once per contact per transition: a failed send is
//! logged and dropped, and exactly one alert record is written afterwards
//! whatever the individual outcomes were.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    Error, Result,
    checker::CheckResult,
    models::{AlertRecord, AlertType, Monitor, MonitorStatus},
    store::MonitorStore,
};

pub mod notifier;
pub mod template;

pub use notifier::{LogNotifier, Notifier, SmtpNotifier};

#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub record: AlertRecord,
}

pub fn compose_message(
    monitor: &Monitor,
    from: MonitorStatus,
    to: MonitorStatus,
    result: &CheckResult,
) -> String {
    let mut message = format!(
        "Monitor {} is now {} (was {}). Status Code: {}, Response Time: {:.0}ms",
        monitor.url, to, from, result.status_code, result.response_time
    );
    if !result.error.is_empty() {
        message.push_str(". ");
        message.push_str(&result.error);
    }
    message
}

pub struct AlertDispatcher {
    store: Arc<dyn MonitorStore>,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn MonitorStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn dispatch(
        &self,
        monitor: &Monitor,
        from: MonitorStatus,
        to: MonitorStatus,
        result: &CheckResult,
    ) -> Result<DispatchReport> {
        let alert_type = AlertType::for_status(to).ok_or_else(|| {
            Error::internal(format!("monitor {} transition to unknown status", monitor.id))
        })?;
        let message = compose_message(monitor, from, to, result);

        // A missing contact list must not swallow the record of the transition.
        let contacts = match self.store.contacts_for(monitor.user_id).await {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(monitor_id = monitor.id, error = %e, "Failed to load alert contacts");
                Vec::new()
            }
        };

        let email = template::status_alert(&monitor.url, to, result.response_time, Utc::now());
        let mut delivered = 0;
        for contact in &contacts {
            match self.notifier.send(&contact.email, &email.subject, &email.html).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    monitor_id = monitor.id,
                    contact = %contact.email,
                    channel = self.notifier.name(),
                    error = %e,
                    "Alert delivery failed"
                ),
            }
        }

        let record = self
            .store
            .append_alert(monitor.id, alert_type, &message)
            .await?;

        info!(
            monitor_id = monitor.id,
            alert_type = alert_type.as_str(),
            contacts = contacts.len(),
            delivered,
            "Alert dispatched"
        );

        Ok(DispatchReport {
            attempted: contacts.len(),
            delivered,
            failed: contacts.len() - delivered,
            record,
        })
    }
}

#[cfg(test)]
mod dispatcher_test;
