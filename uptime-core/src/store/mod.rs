use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    Result,
    buckets::Bucket,
    models::{AlertContact, AlertRecord, AlertType, CheckLog, Monitor, MonitorStatus, NewCheckLog},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgMonitorStore;

/// Persistence consumed by the check engine. Implementations must tolerate
/// concurrent calls from many check tasks.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Active monitors whose interval maps to `bucket`.
    async fn monitors_due_for(&self, bucket: &Bucket) -> Result<Vec<Monitor>>;

    async fn monitor_by_id(&self, monitor_id: i32) -> Result<Option<Monitor>>;

    async fn append_check_log(&self, entry: NewCheckLog) -> Result<CheckLog>;

    async fn current_status(&self, monitor_id: i32) -> Result<MonitorStatus>;

    /// Compare-and-set of the stored status. Returns `false` without writing
    /// when the stored value is no longer `expected`.
    async fn update_status(
        &self,
        monitor_id: i32,
        expected: MonitorStatus,
        new_status: MonitorStatus,
    ) -> Result<bool>;

    /// Writes the status, last alerted status and alert time in one update.
    async fn update_alert_state(
        &self,
        monitor_id: i32,
        new_status: MonitorStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn contacts_for(&self, user_id: Uuid) -> Result<Vec<AlertContact>>;

    async fn append_alert(
        &self,
        monitor_id: i32,
        alert_type: AlertType,
        message: &str,
    ) -> Result<AlertRecord>;
}
