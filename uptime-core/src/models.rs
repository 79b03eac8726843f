use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// A NULL status column has never been written by a check.
    pub fn from_column(value: Option<String>) -> Result<Self, Error> {
        match value {
            Some(raw) => raw.parse(),
            None => Ok(Self::Unknown),
        }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "unknown" => Ok(Self::Unknown),
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(Error::validation(format!("unknown monitor status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorType {
    #[default]
    Http,
}

impl FromStr for MonitorType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "http" | "https" => Ok(Self::Http),
            other => Err(Error::validation(format!("unsupported monitor type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i32,
    pub user_id: Uuid,
    pub url: String,
    pub method: String,
    pub monitor_type: MonitorType,
    pub interval: i32,
    pub status: MonitorStatus,
    pub last_status: Option<MonitorStatus>,
    pub last_alert_sent_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    /// A fresh, never-checked monitor. Used by stores and tests; real rows come from CRUD.
    pub fn new(id: i32, user_id: Uuid, url: impl Into<String>, interval: i32) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            url: url.into(),
            method: "GET".to_string(),
            monitor_type: MonitorType::Http,
            interval,
            status: MonitorStatus::Unknown,
            last_status: None,
            last_alert_sent_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCheckLog {
    pub monitor_id: i32,
    pub status_code: i32,
    pub response_time: f64,
    pub dns_ok: bool,
    pub ssl_ok: bool,
    pub content_ok: bool,
    pub screenshot_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckLog {
    pub id: i64,
    pub monitor_id: i32,
    pub status_code: i32,
    pub response_time: f64,
    pub dns_ok: bool,
    pub ssl_ok: bool,
    pub content_ok: bool,
    pub screenshot_url: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertContact {
    pub id: i32,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Up,
    Down,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// `Unknown` never produces an alert, so it has no alert type.
    pub fn for_status(status: MonitorStatus) -> Option<Self> {
        match status {
            MonitorStatus::Up => Some(Self::Up),
            MonitorStatus::Down => Some(Self::Down),
            MonitorStatus::Unknown => None,
        }
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(Error::validation(format!("unknown alert type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: i64,
    pub monitor_id: i32,
    pub alert_type: AlertType,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_status_reads_as_unknown() {
        assert_eq!(MonitorStatus::from_column(None).unwrap(), MonitorStatus::Unknown);
        assert_eq!(
            MonitorStatus::from_column(Some("down".into())).unwrap(),
            MonitorStatus::Down
        );
        assert!(MonitorStatus::from_column(Some("degraded".into())).is_err());
    }

    #[test]
    fn unknown_status_has_no_alert_type() {
        assert_eq!(AlertType::for_status(MonitorStatus::Up), Some(AlertType::Up));
        assert_eq!(AlertType::for_status(MonitorStatus::Down), Some(AlertType::Down));
        assert_eq!(AlertType::for_status(MonitorStatus::Unknown), None);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MonitorStatus::Down).unwrap(), "\"down\"");
        assert_eq!(MonitorStatus::Up.to_string(), "up");
    }
}
