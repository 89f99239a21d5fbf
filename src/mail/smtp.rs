//! SMTP delivery via lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use super::MailSender;
use crate::error::MailError;

/// SMTP settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl EmailConfig {
    /// Build config from environment variables.
    /// Returns `None` if `EMAIL_SMTP_HOST` is not set (SMTP disabled).
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("EMAIL_SMTP_HOST").ok().filter(|h| !h.is_empty())?;

        let smtp_port: u16 = std::env::var("EMAIL_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("EMAIL_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("EMAIL_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
        })
    }
}

pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
        let from: Mailbox = parse_mailbox(&self.config.from_address)?;
        let to: Mailbox = parse_mailbox(to)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| MailError::SendFailed {
                transport: "smtp".into(),
                reason: format!("Failed to build email: {e}"),
            })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|e: lettre::address::AddressError| MailError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError> {
        let email = self.build_message(to, subject, body)?;

        let host = self.config.smtp_host.clone();
        let port = self.config.smtp_port;
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        // lettre's SmtpTransport is blocking.
        tokio::task::spawn_blocking(move || {
            let transport = SmtpTransport::relay(&host)
                .map_err(|e| MailError::SendFailed {
                    transport: "smtp".into(),
                    reason: format!("SMTP relay error: {e}"),
                })?
                .port(port)
                .credentials(creds)
                .build();

            transport.send(&email).map_err(|e| MailError::SendFailed {
                transport: "smtp".into(),
                reason: e.to_string(),
            })
        })
        .await
        .map_err(|e| MailError::SendFailed {
            transport: "smtp".into(),
            reason: format!("send task failed: {e}"),
        })??;

        info!(to, subject, "Email sent via SMTP");
        Ok(format!("Email sent to {to}"))
    }

    fn transport(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> SmtpMailer {
        SmtpMailer::new(EmailConfig {
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            username: "bot@example.com".into(),
            password: SecretString::from("pw"),
            from_address: "Nosy Worker <bot@example.com>".into(),
        })
    }

    #[test]
    fn message_builds_with_display_name_sender() {
        let message = mailer()
            .build_message("client@techcorp.com", "Follow-up", "Hello")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: client@techcorp.com"));
        assert!(raw.contains("Subject: Follow-up"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected_before_sending() {
        let err = mailer().send("not an address", "s", "b").await.unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress { ref address, .. } if address == "not an address"));
    }
}
