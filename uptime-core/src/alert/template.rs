use chrono::{DateTime, Utc};

use crate::models::MonitorStatus;

pub struct StatusEmail {
    pub subject: String,
    pub html: String,
}

fn color_for(status: MonitorStatus) -> &'static str {
    match status {
        MonitorStatus::Up => "green",
        MonitorStatus::Down => "red",
        MonitorStatus::Unknown => "gray",
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn status_alert(
    url: &str,
    status: MonitorStatus,
    response_time_ms: f64,
    checked_at: DateTime<Utc>,
) -> StatusEmail {
    let label = status.as_str().to_uppercase();
    let subject = format!("Website Status: {url} - {label}");
    let url = escape_html(url);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <style>
    body {{ font-family: Arial, sans-serif; background-color: #f9f9f9; color: #333; padding: 20px; }}
    .container {{ background: white; padding: 20px; border-radius: 10px; max-width: 600px; margin: auto; }}
    .status {{ color: {color}; font-weight: bold; font-size: 18px; }}
    .footer {{ margin-top: 20px; font-size: 12px; color: #777; text-align: center; }}
  </style>
</head>
<body>
  <div class="container">
    <h2>Website Status Alert</h2>
    <p>Hello,</p>
    <p>Your website <strong>{url}</strong> is currently <span class="status">{label}</span>.</p>
    <p>Response time: <strong>{response_time_ms:.0}ms</strong></p>
    <p>Last checked: <strong>{checked}</strong></p>
    <div class="footer">Powered by <strong>Better Uptime Monitor</strong></div>
  </div>
</body>
</html>"#,
        color = color_for(status),
        checked = checked_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    StatusEmail { subject, html }
}
