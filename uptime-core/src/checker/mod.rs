//! One-shot health probe of a monitor URL.
//!
//! A probe runs DNS resolution, an optional TLS handshake and the HTTP request,
//! in that order, and classifies the outcome. It never touches persistence.

use async_trait::async_trait;
use reqwest::{Client, Method, Url, redirect};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::{Result, config::CheckerConfig, models::{Monitor, MonitorStatus}};

pub mod classify;
pub mod tls;

pub use classify::ErrorKind;
use classify::{
    TOO_MANY_REDIRECTS, classify_transport_error, error_chain_text, http_error_message,
    is_certificate_error, status_for_code,
};
use tls::TlsProbe;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub url: String,
    pub status_code: u16,
    /// Milliseconds.
    pub response_time: f64,
    pub status: MonitorStatus,
    pub dns_ok: bool,
    pub ssl_ok: bool,
    pub error_kind: ErrorKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl CheckResult {
    fn down(url: &str, kind: ErrorKind, detail: impl AsRef<str>) -> Self {
        Self {
            url: url.to_string(),
            status_code: 0,
            response_time: 0.0,
            status: MonitorStatus::Down,
            dns_ok: false,
            ssl_ok: false,
            error_kind: kind,
            error: format!("{kind}: {}", detail.as_ref()),
        }
    }

    fn elapsed(mut self, since: Instant) -> Self {
        self.response_time = elapsed_ms(since);
        self
    }

    pub fn is_up(&self) -> bool {
        self.status == MonitorStatus::Up
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Anything that can turn a monitor into a classified check result.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, monitor: &Monitor) -> CheckResult;
}

#[derive(Clone)]
pub struct HealthChecker {
    http: Client,
    tls: TlsProbe,
    config: CheckerConfig,
}

impl HealthChecker {
    pub fn new(config: CheckerConfig) -> Result<Self> {
        let max_redirects = config.max_redirects;
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .no_proxy()
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() > max_redirects {
                    attempt.error(TOO_MANY_REDIRECTS)
                } else {
                    attempt.follow()
                }
            }))
            .build()?;
        let tls = TlsProbe::new(config.tls_timeout())?;

        Ok(Self { http, tls, config })
    }

    pub async fn check(&self, monitor: &Monitor) -> CheckResult {
        let start = Instant::now();
        let url_str = monitor.url.as_str();

        let url = match Url::parse(url_str) {
            Ok(url) if url.host_str().is_some() => url,
            Ok(_) => return CheckResult::down(url_str, ErrorKind::Unknown, "Invalid URL: missing host"),
            Err(e) => return CheckResult::down(url_str, ErrorKind::Unknown, format!("Invalid URL: {e}")),
        };
        // IPv6 literals come back bracketed.
        let host = url.host_str().unwrap_or_default().trim_matches(['[', ']']).to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        let is_https = url.scheme() == "https";

        // Phase 1: DNS
        if let Err(e) = self.resolve(&host, port).await {
            debug!(monitor_id = monitor.id, host = %host, error = %e, "DNS resolution failed");
            return CheckResult::down(
                url_str,
                ErrorKind::DnsFailed,
                format!("Domain does not exist or DNS lookup failed: {e}"),
            )
            .elapsed(start);
        }

        // Phase 2: TLS
        let ssl_ok = if is_https {
            match self.tls.handshake(&host, port).await {
                Ok(()) => true,
                Err(e) if is_certificate_error(&e) => {
                    let mut result = CheckResult::down(
                        url_str,
                        ErrorKind::SslError,
                        format!("SSL certificate error: {e}"),
                    )
                    .elapsed(start);
                    result.dns_ok = true;
                    return result;
                }
                Err(e) => {
                    debug!(monitor_id = monitor.id, host = %host, error = %e, "TLS handshake failed, continuing with HTTP");
                    false
                }
            }
        } else {
            false
        };

        // Phase 3: HTTP
        let method = match Method::from_bytes(monitor.method.to_ascii_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                let mut result = CheckResult::down(
                    url_str,
                    ErrorKind::Unknown,
                    format!("Failed to create request: {e}"),
                )
                .elapsed(start);
                result.dns_ok = true;
                result.ssl_ok = ssl_ok;
                return result;
            }
        };

        let request_start = Instant::now();
        let outcome = self.http.request(method, url).send().await;
        let response_time = elapsed_ms(request_start);

        let (status_code, status, error_kind, error) = match outcome {
            Ok(response) => {
                let code = response.status().as_u16();
                match status_for_code(code) {
                    MonitorStatus::Up => (code, MonitorStatus::Up, ErrorKind::None, String::new()),
                    _ => (
                        code,
                        MonitorStatus::Down,
                        ErrorKind::HttpError,
                        format!("{}: {}", ErrorKind::HttpError, http_error_message(code)),
                    ),
                }
            }
            Err(e) => {
                let timed_out = e.is_timeout();
                let text = error_chain_text(&e.without_url());
                let (kind, message) = classify_transport_error(&text, timed_out);
                if kind == ErrorKind::Unknown {
                    warn!(monitor_id = monitor.id, error = %text, "Unclassified transport failure");
                }
                (0, MonitorStatus::Down, kind, format!("{kind}: {message}"))
            }
        };

        CheckResult {
            url: url_str.to_string(),
            status_code,
            response_time,
            status,
            dns_ok: true,
            ssl_ok,
            error_kind,
            error,
        }
    }

    async fn resolve(&self, host: &str, port: u16) -> std::result::Result<(), String> {
        match tokio::time::timeout(self.config.dns_timeout(), tokio::net::lookup_host((host, port))).await {
            Ok(Ok(mut addrs)) => match addrs.next() {
                Some(_) => Ok(()),
                None => Err(format!("no addresses found for {host}")),
            },
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("lookup of {host} timed out")),
        }
    }
}

#[async_trait]
impl Probe for HealthChecker {
    async fn probe(&self, monitor: &Monitor) -> CheckResult {
        self.check(monitor).await
    }
}
