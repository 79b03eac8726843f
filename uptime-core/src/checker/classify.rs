use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{error::Error as StdError, fmt};

use crate::models::MonitorStatus;

pub const TOO_MANY_REDIRECTS: &str = "too many redirects";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[default]
    None,
    DnsFailed,
    ConnectionRefused,
    SslError,
    Timeout,
    HttpError,
    TooManyRedirects,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::DnsFailed => "DNS_FAILED",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::SslError => "SSL_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::HttpError => "HTTP_ERROR",
            Self::TooManyRedirects => "TOO_MANY_REDIRECTS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattens an error and all of its sources into one lowercase string.
/// reqwest keeps the interesting part ("connection refused", the redirect
/// policy message) in the source chain, not in its own `Display`.
pub fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text.to_lowercase()
}

/// Maps transport-level failure text to an error kind and a readable message.
pub fn classify_transport_error(text: &str, timed_out: bool) -> (ErrorKind, String) {
    let lower = text.to_lowercase();

    if lower.contains(TOO_MANY_REDIRECTS) {
        (ErrorKind::TooManyRedirects, "Too many redirects".to_string())
    } else if lower.contains("connection refused") {
        (
            ErrorKind::ConnectionRefused,
            "Connection refused - server is not accepting connections".to_string(),
        )
    } else if timed_out
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("deadline exceeded")
    {
        (
            ErrorKind::Timeout,
            "Request timed out - server did not respond in time".to_string(),
        )
    } else if lower.contains("no such host")
        || lower.contains("failed to lookup address")
        || lower.contains("dns error")
    {
        (ErrorKind::DnsFailed, "Domain does not exist".to_string())
    } else {
        (ErrorKind::Unknown, text.to_string())
    }
}

pub fn is_certificate_error(text: &str) -> bool {
    text.to_lowercase().contains("certificate")
}

/// 2xx and 3xx are up, everything else (including 0 for "no response") is down.
pub fn status_for_code(code: u16) -> MonitorStatus {
    if (200..400).contains(&code) {
        MonitorStatus::Up
    } else {
        MonitorStatus::Down
    }
}

pub fn http_error_message(code: u16) -> String {
    let reason = StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status");
    format!("HTTP {code} - {reason}")
}
