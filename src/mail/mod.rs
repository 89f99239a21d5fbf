//! Outgoing mail for action-item follow-ups.
//!
//! [`MailSender`] is implemented by the Outlook mailbox and by
//! [`SmtpMailer`]. SMTP wins when `EMAIL_SMTP_HOST` is configured.

pub mod smtp;

pub use smtp::{EmailConfig, SmtpMailer};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::MailError;

/// Something that can deliver a plain-text email.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Send and return a human-readable confirmation.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError>;

    /// Short transport name for logs and responses.
    fn transport(&self) -> &'static str;
}

/// The action an email is about, as posted by the dashboard. Every field is
/// optional so a partially filled card still sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionDetails {
    pub action: String,
    pub reasoning: String,
    pub priority: String,
    pub category: String,
    pub client: String,
}

/// User message followed by a block describing the action.
pub fn compose_action_email(message: &str, action: Option<&ActionDetails>) -> String {
    let mut body = message.trim_end().to_string();
    let Some(action) = action else {
        return body;
    };

    let fields = [
        ("Action", &action.action),
        ("Reasoning", &action.reasoning),
        ("Priority", &action.priority),
        ("Category", &action.category),
        ("Client", &action.client),
    ];
    let lines: Vec<String> = fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(label, value)| format!("{label}: {value}"))
        .collect();

    if !lines.is_empty() {
        if !body.is_empty() {
            body.push_str("\n\n");
        }
        body.push_str("---\n");
        body.push_str(&lines.join("\n"));
    }
    body
}
