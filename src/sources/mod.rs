//! Conversation sources backed by Slack and Outlook.
//!
//! Adapters turn upstream messages into a [`Conversation`], the transcript
//! that gets summarized. Nothing here is persisted.

pub mod outlook;
pub mod slack;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

pub use outlook::{OutlookConfig, OutlookMailbox, OutlookSession};
pub use slack::{SlackAdapter, SlackConfig, SlackWebApi};

/// Display format for message timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: String,
}

impl ConversationMessage {
    pub fn new(
        sender: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// An ordered (oldest first) set of messages assembled for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    pub messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new(messages: Vec<ConversationMessage>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// One line per message: `[timestamp] sender: text`.
    pub fn to_transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}] {}: {}", m.timestamp, m.sender, m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Inclusive `[start, end]` range in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// Parse two ISO-8601 timestamps. Offsets (`Z`, `+02:00`) are honored;
    /// a timestamp without an offset is read as UTC.
    pub fn from_iso(start: &str, end: &str) -> Result<Self, String> {
        let start = parse_iso(start).map_err(|e| format!("invalid startTime `{start}`: {e}"))?;
        let end = parse_iso(end).map_err(|e| format!("invalid endTime `{end}`: {e}"))?;
        if end < start {
            return Err("endTime is before startTime".to_string());
        }
        Ok(Self {
            start: start.timestamp(),
            end: end.timestamp(),
        })
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts <= self.end
    }
}

fn parse_iso(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(e) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| e),
    }
}

/// A chat workspace that can produce conversations for a channel.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Messages posted in `channel_id` between `oldest` and `latest`
    /// (Unix seconds). Upstream failures degrade to a partial result.
    async fn fetch(&self, channel_id: &str, oldest: i64, latest: i64) -> Conversation;

    /// Workspace-wide message search, newest first.
    async fn search(&self, query: &str, count: u32) -> Conversation;
}

/// A mailbox that can produce conversations from a folder.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Up to `count` emails from `folder` received within `window`.
    async fn fetch_folder(
        &self,
        folder: &str,
        count: u32,
        window: TimeWindow,
    ) -> Result<Conversation, SourceError>;

    /// Whether the mailbox currently holds a valid login.
    async fn check_auth(&self) -> Result<bool, SourceError>;

    /// Start an interactive login. Returns the link the user must visit, if any.
    async fn authenticate(&self) -> Result<AuthStart, SourceError>;
}

/// Outcome of starting an authentication flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStart {
    pub auth_url: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_converts_iso_to_unix_seconds() {
        let window =
            TimeWindow::from_iso("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z").unwrap();
        assert_eq!(window.start, 1_704_067_200);
        assert_eq!(window.end, 1_704_153_600);
    }

    #[test]
    fn window_honors_offsets_and_naive_utc() {
        let window =
            TimeWindow::from_iso("2024-01-01T02:00:00+02:00", "2024-01-01T00:00:10").unwrap();
        assert_eq!(window.start, 1_704_067_200);
        assert_eq!(window.end, 1_704_067_210);
    }

    #[test]
    fn window_rejects_garbage_and_reversed_ranges() {
        assert!(TimeWindow::from_iso("yesterday", "2024-01-02T00:00:00Z").is_err());
        assert!(
            TimeWindow::from_iso("2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z").is_err()
        );
    }

    #[test]
    fn transcript_is_one_line_per_message() {
        let conversation = Conversation::new(vec![
            ConversationMessage::new("Alice", "hi", "2024-01-01 00:00:00"),
            ConversationMessage::new("User U2", "hello", "2024-01-01 00:01:00"),
        ]);
        assert_eq!(
            conversation.to_transcript(),
            "[2024-01-01 00:00:00] Alice: hi\n[2024-01-01 00:01:00] User U2: hello"
        );
    }
}
