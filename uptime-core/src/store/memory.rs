use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use uuid::Uuid;

use super::MonitorStore;
use crate::{
    Error, Result,
    buckets::Bucket,
    models::{
        AlertContact, AlertRecord, AlertType, CheckLog, Monitor, MonitorStatus, NewCheckLog,
    },
};

#[derive(Default)]
struct Tables {
    monitors: Vec<Monitor>,
    logs: Vec<CheckLog>,
    contacts: Vec<AlertContact>,
    alerts: Vec<AlertRecord>,
}

/// Process-local store for tests and demos.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_alert_appends: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| Error::internal("in-memory store lock poisoned"))
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::internal("simulated read failure"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::internal("simulated write failure"));
        }
        Ok(())
    }

    /// Makes every subsequent read fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` alert appends fail; other writes are unaffected.
    pub fn fail_next_alert_appends(&self, count: usize) {
        self.failing_alert_appends.store(count, Ordering::SeqCst);
    }

    pub fn insert_monitor(&self, monitor: Monitor) -> Result<()> {
        let mut tables = self.tables()?;
        tables.monitors.retain(|m| m.id != monitor.id);
        tables.monitors.push(monitor);
        Ok(())
    }

    pub fn add_contact(&self, user_id: Uuid, name: &str, email: &str) -> Result<AlertContact> {
        let mut tables = self.tables()?;
        let contact = AlertContact {
            id: tables.contacts.len() as i32 + 1,
            user_id,
            name: name.to_string(),
            email: email.to_string(),
            is_verified: false,
            created_at: Utc::now(),
        };
        tables.contacts.push(contact.clone());
        Ok(contact)
    }

    pub fn monitor(&self, monitor_id: i32) -> Result<Option<Monitor>> {
        Ok(self.tables()?.monitors.iter().find(|m| m.id == monitor_id).cloned())
    }

    pub fn logs_for(&self, monitor_id: i32) -> Result<Vec<CheckLog>> {
        Ok(self
            .tables()?
            .logs
            .iter()
            .filter(|l| l.monitor_id == monitor_id)
            .cloned()
            .collect())
    }

    pub fn alerts_for(&self, monitor_id: i32) -> Result<Vec<AlertRecord>> {
        Ok(self
            .tables()?
            .alerts
            .iter()
            .filter(|a| a.monitor_id == monitor_id)
            .cloned()
            .collect())
    }
}

fn not_found(monitor_id: i32) -> Error {
    Error::not_found(format!("monitor {monitor_id}"))
}

#[async_trait]
impl MonitorStore for InMemoryStore {
    async fn monitors_due_for(&self, bucket: &Bucket) -> Result<Vec<Monitor>> {
        self.check_read()?;
        Ok(self
            .tables()?
            .monitors
            .iter()
            .filter(|m| m.is_active && bucket.contains(m.interval))
            .cloned()
            .collect())
    }

    async fn monitor_by_id(&self, monitor_id: i32) -> Result<Option<Monitor>> {
        self.check_read()?;
        self.monitor(monitor_id)
    }

    async fn append_check_log(&self, entry: NewCheckLog) -> Result<CheckLog> {
        self.check_write()?;
        let mut tables = self.tables()?;
        let log = CheckLog {
            id: tables.logs.len() as i64 + 1,
            monitor_id: entry.monitor_id,
            status_code: entry.status_code,
            response_time: entry.response_time,
            dns_ok: entry.dns_ok,
            ssl_ok: entry.ssl_ok,
            content_ok: entry.content_ok,
            screenshot_url: entry.screenshot_url,
            checked_at: Utc::now(),
        };
        tables.logs.push(log.clone());
        Ok(log)
    }

    async fn current_status(&self, monitor_id: i32) -> Result<MonitorStatus> {
        self.check_read()?;
        self.tables()?
            .monitors
            .iter()
            .find(|m| m.id == monitor_id)
            .map(|m| m.status)
            .ok_or_else(|| not_found(monitor_id))
    }

    async fn update_status(
        &self,
        monitor_id: i32,
        expected: MonitorStatus,
        new_status: MonitorStatus,
    ) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables()?;
        let monitor = tables
            .monitors
            .iter_mut()
            .find(|m| m.id == monitor_id)
            .ok_or_else(|| not_found(monitor_id))?;

        if monitor.status != expected {
            return Ok(false);
        }
        monitor.status = new_status;
        monitor.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_alert_state(
        &self,
        monitor_id: i32,
        new_status: MonitorStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables()?;
        let monitor = tables
            .monitors
            .iter_mut()
            .find(|m| m.id == monitor_id)
            .ok_or_else(|| not_found(monitor_id))?;

        monitor.status = new_status;
        monitor.last_status = Some(new_status);
        monitor.last_alert_sent_at = Some(at);
        monitor.updated_at = Utc::now();
        Ok(())
    }

    async fn contacts_for(&self, user_id: Uuid) -> Result<Vec<AlertContact>> {
        self.check_read()?;
        Ok(self
            .tables()?
            .contacts
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn append_alert(
        &self,
        monitor_id: i32,
        alert_type: AlertType,
        message: &str,
    ) -> Result<AlertRecord> {
        self.check_write()?;
        let injected = self
            .failing_alert_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::internal("simulated alert write failure"));
        }
        let mut tables = self.tables()?;
        let record = AlertRecord {
            id: tables.alerts.len() as i64 + 1,
            monitor_id,
            alert_type,
            message: message.to_string(),
            sent_at: Utc::now(),
        };
        tables.alerts.push(record.clone());
        Ok(record)
    }
}
