use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use super::MonitorStore;
use crate::{
    Error, Result,
    buckets::Bucket,
    db::DatabasePool,
    models::{
        AlertContact, AlertRecord, AlertType, CheckLog, Monitor, MonitorStatus, NewCheckLog,
    },
};

const MONITOR_COLUMNS: &str = r#"
    id, user_id, url, method, type, interval,
    status::text AS status, last_status::text AS last_status,
    last_alert_sent_at, is_active, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgMonitorStore {
    db: DatabasePool,
}

impl PgMonitorStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }
}

fn monitor_from_row(row: &PgRow) -> Result<Monitor> {
    let last_status: Option<String> = row.try_get("last_status")?;
    let monitor_type: String = row.try_get("type")?;

    Ok(Monitor {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        url: row.try_get("url")?,
        method: row.try_get("method")?,
        monitor_type: monitor_type.parse()?,
        interval: row.try_get("interval")?,
        status: MonitorStatus::from_column(row.try_get("status")?)?,
        last_status: last_status.map(|s| s.parse()).transpose()?,
        last_alert_sent_at: row.try_get("last_alert_sent_at")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// `monitors.interval` is an INTEGER column.
fn interval_bound(secs: i64) -> Result<i32> {
    i32::try_from(secs)
        .map_err(|_| Error::validation(format!("bucket bound {secs}s exceeds the interval column range")))
}

#[async_trait]
impl MonitorStore for PgMonitorStore {
    async fn monitors_due_for(&self, bucket: &Bucket) -> Result<Vec<Monitor>> {
        let sql = format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors \
             WHERE is_active = true AND interval > $1 AND ($2::INTEGER IS NULL OR interval <= $2) \
             ORDER BY id"
        );
        let lower = interval_bound(bucket.lower_exclusive)?;
        let upper = bucket.upper_inclusive.map(interval_bound).transpose()?;
        let rows = sqlx::query(&sql)
            .bind(lower)
            .bind(upper)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(monitor_from_row).collect()
    }

    async fn monitor_by_id(&self, monitor_id: i32) -> Result<Option<Monitor>> {
        let sql = format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(monitor_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(monitor_from_row).transpose()
    }

    async fn append_check_log(&self, entry: NewCheckLog) -> Result<CheckLog> {
        let log = sqlx::query_as::<_, CheckLog>(
            r#"
            INSERT INTO monitor_logs (monitor_id, status_code, response_time, dns_ok, ssl_ok, content_ok, screenshot_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, monitor_id, status_code, response_time, dns_ok, ssl_ok, content_ok, screenshot_url, checked_at
            "#,
        )
        .bind(entry.monitor_id)
        .bind(entry.status_code)
        .bind(entry.response_time)
        .bind(entry.dns_ok)
        .bind(entry.ssl_ok)
        .bind(entry.content_ok)
        .bind(&entry.screenshot_url)
        .fetch_one(&self.db)
        .await?;

        Ok(log)
    }

    async fn current_status(&self, monitor_id: i32) -> Result<MonitorStatus> {
        let row = sqlx::query("SELECT status::text AS status FROM monitors WHERE id = $1")
            .bind(monitor_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::not_found(format!("monitor {monitor_id}")))?;

        MonitorStatus::from_column(row.try_get("status")?)
    }

    async fn update_status(
        &self,
        monitor_id: i32,
        expected: MonitorStatus,
        new_status: MonitorStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE monitors
            SET status = $3::monitor_status, updated_at = NOW()
            WHERE id = $1 AND COALESCE(status::text, 'unknown') = $2
            "#,
        )
        .bind(monitor_id)
        .bind(expected.as_str())
        .bind(new_status.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_alert_state(
        &self,
        monitor_id: i32,
        new_status: MonitorStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE monitors
            SET status = $2::monitor_status,
                last_status = $2::monitor_status,
                last_alert_sent_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(monitor_id)
        .bind(new_status.as_str())
        .bind(at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("monitor {monitor_id}")));
        }
        Ok(())
    }

    async fn contacts_for(&self, user_id: Uuid) -> Result<Vec<AlertContact>> {
        let contacts = sqlx::query_as::<_, AlertContact>(
            "SELECT id, user_id, name, email, is_verified, created_at FROM alert_contacts WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(contacts)
    }

    async fn append_alert(
        &self,
        monitor_id: i32,
        alert_type: AlertType,
        message: &str,
    ) -> Result<AlertRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO alerts (monitor_id, alert_type, message)
            VALUES ($1, $2, $3)
            RETURNING id, sent_at
            "#,
        )
        .bind(monitor_id)
        .bind(alert_type.as_str())
        .bind(message)
        .fetch_one(&self.db)
        .await?;

        Ok(AlertRecord {
            id: row.try_get("id")?,
            monitor_id,
            alert_type,
            message: message.to_string(),
            sent_at: row.try_get("sent_at")?,
        })
    }
}
