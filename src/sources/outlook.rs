//! Outlook mail access through the Node `outlook-mcp` server.
//!
//! Every mailbox operation opens an [`OutlookSession`] (one child process),
//! runs its tool calls, and closes it again.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{AuthStart, Conversation, ConversationMessage, MailSource, TIMESTAMP_FORMAT, TimeWindow};
use crate::error::{MailError, SourceError};
use crate::mail::MailSender;
use crate::mcp::{ServerCommand, StdioClient};

static AUTH_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).unwrap());

static SENDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\(([^()]*)\)\s*$").unwrap());

/// Reply text of `check-auth-status` when no token is cached.
const NOT_AUTHENTICATED: &str = "Not authenticated";

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OutlookConfig {
    pub node_binary: String,
    pub script: PathBuf,
    pub client_id: Option<SecretString>,
    pub client_secret: Option<SecretString>,
    pub request_timeout: Duration,
    /// Emails listed per folder fetch.
    pub fetch_count: u32,
}

impl Default for OutlookConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".into(),
            script: PathBuf::from("../outlook-mcp/index.js"),
            client_id: None,
            client_secret: None,
            request_timeout: Duration::from_secs(60),
            fetch_count: 25,
        }
    }
}

impl OutlookConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        Self {
            node_binary: env("NODE_BINARY").unwrap_or(defaults.node_binary),
            script: env("OUTLOOK_MCP_SCRIPT").map(PathBuf::from).unwrap_or(defaults.script),
            client_id: env("OUTLOOK_CLIENT_ID").map(SecretString::from),
            client_secret: env("OUTLOOK_CLIENT_SECRET").map(SecretString::from),
            request_timeout: env("OUTLOOK_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            fetch_count: env("OUTLOOK_FETCH_COUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_count),
        }
    }

    fn server_command(&self) -> ServerCommand {
        let mut cmd = ServerCommand::new(&self.node_binary)
            .arg(self.script.to_string_lossy())
            .with_timeout(self.request_timeout);
        if let Some(id) = &self.client_id {
            cmd = cmd.env("OUTLOOK_CLIENT_ID", id.expose_secret());
        }
        if let Some(secret) = &self.client_secret {
            cmd = cmd.env("OUTLOOK_CLIENT_SECRET", secret.expose_secret());
        }
        cmd
    }
}

// ── Email ───────────────────────────────────────────────────────────

/// A single email as returned by `read-email`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub id: String,
    pub from_name: String,
    pub from_address: String,
    pub subject: String,
    pub date: Option<String>,
    pub body: String,
}

impl Email {
    /// Parse the tool's text reply: headers, a blank line, then the body.
    pub fn parse(id: &str, raw: &str) -> Self {
        let (headers, body) = split_headers(raw);
        let mut email = Email {
            id: id.to_string(),
            body: body.trim().to_string(),
            ..Default::default()
        };

        for line in headers.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "from" => {
                    let (name, address) = parse_sender(value);
                    email.from_name = name;
                    email.from_address = address;
                }
                "subject" => email.subject = value.to_string(),
                "date" => email.date = Some(value.to_string()),
                _ => {}
            }
        }
        email
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.date.as_deref().and_then(parse_email_date)
    }

    fn sender(&self) -> &str {
        if self.from_name.is_empty() {
            &self.from_address
        } else {
            &self.from_name
        }
    }

    fn into_message(self) -> ConversationMessage {
        let timestamp = match self.received_at() {
            Some(at) => at.format(TIMESTAMP_FORMAT).to_string(),
            None => self.date.clone().unwrap_or_default(),
        };
        let text = format!("Subject: {}\n{}", self.subject, self.body);
        ConversationMessage::new(self.sender(), text, timestamp)
    }
}

/// Split at the first blank line. Without one, everything is headers.
pub fn split_headers(raw: &str) -> (&str, &str) {
    let raw = raw.trim_start_matches(['\r', '\n']);
    let first = ["\r\n\r\n", "\n\n"]
        .into_iter()
        .filter_map(|sep| raw.find(sep).map(|idx| (idx, sep.len())))
        .min_by_key(|&(idx, _)| idx);
    match first {
        Some((idx, len)) => (&raw[..idx], &raw[idx + len..]),
        None => (raw, ""),
    }
}

/// `Name (address)` → `(name, address)`; anything else is a bare address.
pub fn parse_sender(value: &str) -> (String, String) {
    match SENDER.captures(value) {
        Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
        None => (String::new(), value.trim().to_string()),
    }
}

/// Ids from `list-emails` output (`ID: <id>` lines).
pub fn parse_email_ids(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ID:"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// First http(s) link in the `authenticate` reply.
pub fn extract_auth_url(text: &str) -> Option<String> {
    AUTH_URL.find(text).map(|m| m.as_str().to_string())
}

/// RFC 2822, RFC 3339, or the US locale format the server prints
/// (`1/15/2024, 10:30:00 AM`, optionally prefixed by a weekday). Naive
/// values are read as UTC.
pub fn parse_email_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let without_weekday = match raw.split_once(", ") {
        Some((head, rest)) if head.chars().all(|c| c.is_ascii_alphabetic()) => rest,
        _ => raw,
    };
    ["%m/%d/%Y, %I:%M:%S %p", "%m/%d/%Y, %I:%M %p", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(without_weekday, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ── Session ─────────────────────────────────────────────────────────

/// One running `outlook-mcp` process.
pub struct OutlookSession {
    client: StdioClient,
}

impl OutlookSession {
    pub async fn open(config: &OutlookConfig) -> Result<Self, SourceError> {
        let client = StdioClient::connect(&config.server_command()).await?;
        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), SourceError> {
        self.client.close().await?;
        Ok(())
    }

    pub async fn list_emails(&mut self, folder: &str, count: u32) -> Result<Vec<String>, SourceError> {
        let listing = self
            .client
            .call_tool("list-emails", json!({ "folder": folder, "count": count }))
            .await?
            .text();
        let ids = parse_email_ids(&listing);
        debug!(folder, count = ids.len(), "Listed Outlook emails");
        Ok(ids)
    }

    pub async fn read_email(&mut self, id: &str) -> Result<Email, SourceError> {
        let raw = self
            .client
            .call_tool("read-email", json!({ "id": id }))
            .await?
            .text();
        Ok(Email::parse(id, &raw))
    }

    pub async fn check_auth(&mut self) -> Result<bool, SourceError> {
        let text = self
            .client
            .call_tool("check-auth-status", json!({}))
            .await?
            .text();
        Ok(!text.contains(NOT_AUTHENTICATED))
    }

    pub async fn authenticate(&mut self) -> Result<AuthStart, SourceError> {
        let text = self.client.call_tool("authenticate", json!({})).await?.text();
        Ok(AuthStart {
            auth_url: extract_auth_url(&text),
            message: text,
        })
    }

    pub async fn send_email(&mut self, to: &str, subject: &str, body: &str) -> Result<String, SourceError> {
        let text = self
            .client
            .call_tool("send-email", json!({ "to": to, "subject": subject, "body": body }))
            .await?
            .text();
        Ok(text)
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// Outlook adapter used by the API layer.
#[derive(Debug, Clone)]
pub struct OutlookMailbox {
    config: OutlookConfig,
}

impl OutlookMailbox {
    pub fn new(config: OutlookConfig) -> Self {
        Self { config }
    }

    pub fn fetch_count(&self) -> u32 {
        self.config.fetch_count
    }

    async fn open(&self) -> Result<OutlookSession, SourceError> {
        OutlookSession::open(&self.config).await
    }
}

async fn finish(session: OutlookSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close Outlook session");
    }
}

#[async_trait]
impl MailSource for OutlookMailbox {
    async fn fetch_folder(
        &self,
        folder: &str,
        count: u32,
        window: TimeWindow,
    ) -> Result<Conversation, SourceError> {
        let mut session = self.open().await?;

        let ids = match session.list_emails(folder, count).await {
            Ok(ids) => ids,
            Err(e) => {
                finish(session).await;
                return Err(e);
            }
        };

        let mut emails = Vec::with_capacity(ids.len());
        for id in &ids {
            match session.read_email(id).await {
                Ok(email) => emails.push(email),
                Err(e) => warn!(email_id = %id, error = %e, "Skipping unreadable email"),
            }
        }
        finish(session).await;

        emails.retain(|email| {
            email
                .received_at()
                .is_none_or(|at| window.contains(at.timestamp()))
        });
        emails.sort_by_key(Email::received_at);

        info!(folder, listed = ids.len(), kept = emails.len(), "Outlook folder fetched");
        Ok(Conversation::new(emails.into_iter().map(Email::into_message).collect()))
    }

    async fn check_auth(&self) -> Result<bool, SourceError> {
        let mut session = self.open().await?;
        let result = session.check_auth().await;
        finish(session).await;
        result
    }

    async fn authenticate(&self) -> Result<AuthStart, SourceError> {
        let mut session = self.open().await?;
        let result = session.authenticate().await;
        finish(session).await;
        result
    }
}

#[async_trait]
impl MailSender for OutlookMailbox {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<String, MailError> {
        let failed = |e: SourceError| MailError::SendFailed {
            transport: "outlook".into(),
            reason: e.to_string(),
        };
        let mut session = self.open().await.map_err(failed)?;
        let result = session.send_email(to, subject, body).await;
        finish(session).await;
        result.map_err(failed)
    }

    fn transport(&self) -> &'static str {
        "outlook"
    }
}
