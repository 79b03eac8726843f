use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

use crate::{Error, Result, config::SmtpConfig};

/// A delivery channel for alert emails. Delivery is best effort; callers
/// never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;

    fn name(&self) -> &str;
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(Error::validation("SMTP username and password are required"));
        }

        let from: Mailbox = config
            .sender()
            .parse()
            .map_err(|e| Error::notification(format!("invalid sender address: {e}")))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| Error::notification(format!("invalid SMTP relay {}: {e}", config.host)))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::notification(format!("invalid recipient {to}: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| Error::notification(format!("failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| Error::notification(format!("failed to send email: {e}")))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// Writes alerts to the log instead of mailing them. Used when SMTP is not configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<()> {
        info!(to, subject, "Alert email (SMTP disabled)");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Picks SMTP when credentials are present, the log channel otherwise.
pub fn from_config(config: &SmtpConfig) -> Result<std::sync::Arc<dyn Notifier>> {
    if config.is_configured() {
        Ok(std::sync::Arc::new(SmtpNotifier::new(config)?))
    } else {
        Ok(std::sync::Arc::new(LogNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp(username: &str, password: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: username.into(),
            password: password.into(),
            from: String::new(),
        }
    }

    #[tokio::test]
    async fn unconfigured_smtp_falls_back_to_log() {
        let notifier = from_config(&smtp("", "")).unwrap();
        assert_eq!(notifier.name(), "log");
        notifier.send("ops@example.com", "subject", "<p>body</p>").await.unwrap();
    }

    #[tokio::test]
    async fn configured_smtp_builds_transport() {
        let notifier = from_config(&smtp("alerts@example.com", "secret")).unwrap();
        assert_eq!(notifier.name(), "smtp");
    }

    #[test]
    fn invalid_sender_is_rejected() {
        assert!(SmtpNotifier::new(&smtp("not-an-address", "secret")).is_err());
    }
}
