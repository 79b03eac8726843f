use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

pub const DEFAULT_BUCKETS: [i64; 7] = [30, 60, 120, 300, 600, 1800, 3600];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    pub request_timeout_secs: u64,
    pub dns_timeout_secs: u64,
    pub tls_timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl CheckerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout_secs)
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            dns_timeout_secs: 10,
            tls_timeout_secs: 10,
            max_redirects: 10,
            user_agent: "BetterUptime/1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub buckets: Vec<i64>,
    pub max_concurrent_checks: usize,
    /// Checks allowed to wait for a worker before new submissions are refused.
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS.to_vec(),
            max_concurrent_checks: 64,
            queue_capacity: 10_000,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn sender(&self) -> &str {
        if self.from.is_empty() {
            &self.username
        } else {
            &self.from
        }
    }
}

// Keeps the password out of startup logs.
impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub checker: CheckerConfig,
    pub scheduler: SchedulerConfig,
    pub smtp: SmtpConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("No .env file found, using process environment");
        }

        let checker = CheckerConfig::default();
        let scheduler = SchedulerConfig::default();

        let mut cfg = config::Config::builder();

        cfg = cfg
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.max_connections", 10)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("checker.request_timeout_secs", checker.request_timeout_secs)?
            .set_default("checker.dns_timeout_secs", checker.dns_timeout_secs)?
            .set_default("checker.tls_timeout_secs", checker.tls_timeout_secs)?
            .set_default("checker.max_redirects", checker.max_redirects as u64)?
            .set_default("checker.user_agent", checker.user_agent)?
            .set_default("scheduler.buckets", scheduler.buckets)?
            .set_default(
                "scheduler.max_concurrent_checks",
                scheduler.max_concurrent_checks as u64,
            )?
            .set_default("scheduler.queue_capacity", scheduler.queue_capacity as u64)?
            .set_default("smtp.host", "smtp.gmail.com")?
            .set_default("smtp.port", 587)?
            .set_default("smtp.from", "")?;

        if let Ok(database_url) = env::var("DATABASE_URL").or_else(|_| env::var("POSTGRES_CONNECTION")) {
            cfg = cfg.set_override("database.url", database_url)?;
        }
        cfg = cfg
            .set_override("database.username", env::var("DATABASE_USERNAME").unwrap_or_else(|_| "monitor".to_string()))?
            .set_override("database.password", env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "password".to_string()))?
            .set_override("database.database", env::var("DATABASE_NAME").unwrap_or_else(|_| "monitor".to_string()))?;

        cfg = cfg
            .set_override("smtp.username", env::var("SMTP_EMAIL").unwrap_or_default())?
            .set_override("smtp.password", env::var("SMTP_PASSWORD").unwrap_or_default())?;

        if let Ok(host) = env::var("SMTP_HOST") {
            cfg = cfg.set_override("smtp.host", host)?;
        }
        if let Ok(port) = env::var("SMTP_PORT") {
            cfg = cfg.set_override("smtp.port", port.parse::<u16>().unwrap_or(587))?;
        }

        if let Ok(port) = env::var("PORT") {
            cfg = cfg.set_override("server.port", port.parse::<u16>().unwrap_or(8080))?;
        }

        if let Ok(buckets) = env::var("SCHEDULER_BUCKETS") {
            cfg = cfg.set_override("scheduler.buckets", parse_buckets(&buckets)?)?;
        }
        if let Ok(limit) = env::var("MAX_CONCURRENT_CHECKS") {
            let limit = limit.parse::<u64>().map_err(|e| {
                config::ConfigError::Message(format!("MAX_CONCURRENT_CHECKS: {e}"))
            })?;
            cfg = cfg.set_override("scheduler.max_concurrent_checks", limit)?;
        }
        if let Ok(capacity) = env::var("CHECK_QUEUE_CAPACITY") {
            let capacity = capacity.parse::<u64>().map_err(|e| {
                config::ConfigError::Message(format!("CHECK_QUEUE_CAPACITY: {e}"))
            })?;
            cfg = cfg.set_override("scheduler.queue_capacity", capacity)?;
        }

        cfg.build()?.try_deserialize()
    }
}

/// Parses a comma separated list of bucket periods in seconds, e.g. `"30,60,300"`.
pub fn parse_buckets(raw: &str) -> Result<Vec<i64>, config::ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<i64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(config::ConfigError::Message(format!(
                "invalid bucket period: {s}"
            ))),
        })
        .collect()
}
