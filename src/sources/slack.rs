//! Slack channel history and message search over the Web API.
//!
//! [`SlackWebApi`] speaks HTTP; [`SlackAdapter`] pages through it, drops
//! channel events, resolves display names, and formats timestamps.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ChatSource, Conversation, ConversationMessage, TIMESTAMP_FORMAT};
use crate::error::SourceError;

/// Default Slack Web API root.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Messages requested per history page.
const HISTORY_PAGE_LIMIT: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// Slack tokens and endpoint.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot token (`xoxb-`), used for channel history.
    pub bot_token: SecretString,
    /// User token (`xoxp-`), required by `search.messages`.
    pub user_token: Option<SecretString>,
    pub api_base: String,
}

impl SlackConfig {
    /// Build from the environment. Returns `None` if `SLACK_BOT_TOKEN` is
    /// not set (Slack disabled).
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("SLACK_BOT_TOKEN").ok()?;
        Some(Self {
            bot_token: SecretString::from(bot_token),
            user_token: std::env::var("SLACK_USER_TOKEN").ok().map(SecretString::from),
            api_base: std::env::var("SLACK_API_BASE").unwrap_or_else(|_| SLACK_API_BASE.into()),
        })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

/// A raw Slack message, as returned by history and search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_profile: Option<BotProfile>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ts: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotProfile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    ok: bool,
    #[serde(default)]
    messages: Option<SearchMatches>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchMatches {
    #[serde(default)]
    matches: Vec<SlackMessage>,
}

/// Parameters for one `conversations.history` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub channel: String,
    pub oldest: i64,
    pub latest: i64,
    pub cursor: Option<String>,
    pub limit: u32,
}

/// One page of history plus the cursor for the next one.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<SlackMessage>,
    pub next_cursor: Option<String>,
}

// ── API seam ────────────────────────────────────────────────────────

/// The Slack Web API calls the adapter needs.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn history_page(&self, query: &HistoryQuery) -> Result<HistoryPage, SourceError>;

    async fn search_page(&self, query: &str, count: u32) -> Result<Vec<SlackMessage>, SourceError>;
}

/// reqwest-backed Slack Web API client.
pub struct SlackWebApi {
    client: reqwest::Client,
    config: SlackConfig,
}

impl SlackWebApi {
    pub fn new(config: SlackConfig) -> Result<Self, SourceError> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: SlackConfig, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SourceError::slack_request)?;
        Ok(Self { client, config })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.config.api_base.trim_end_matches('/'))
    }

    async fn get(
        &self,
        method: &str,
        token: &SecretString,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, SourceError> {
        let response = self
            .client
            .get(self.api_url(method))
            .bearer_auth(token.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(SourceError::slack_request)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(30);
            return Err(SourceError::RateLimited {
                source_name: "slack".into(),
                retry_after_secs,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::slack_request(format!("{method}: {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl SlackApi for SlackWebApi {
    async fn history_page(&self, query: &HistoryQuery) -> Result<HistoryPage, SourceError> {
        let mut params = vec![
            ("channel", query.channel.clone()),
            ("limit", query.limit.to_string()),
            ("oldest", query.oldest.to_string()),
            ("latest", query.latest.to_string()),
        ];
        if let Some(cursor) = &query.cursor {
            params.push(("cursor", cursor.clone()));
        }

        let body: HistoryResponse = self
            .get("conversations.history", &self.config.bot_token, &params)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                source_name: "slack".into(),
                reason: e.to_string(),
            })?;

        if !body.ok {
            return Err(SourceError::Api {
                source_name: "slack".into(),
                code: body.error.unwrap_or_else(|| "unknown".into()),
            });
        }

        let next_cursor = body
            .response_metadata
            .and_then(|m| m.next_cursor)
            .filter(|c| !c.is_empty());

        Ok(HistoryPage {
            messages: body.messages,
            next_cursor,
        })
    }

    async fn search_page(&self, query: &str, count: u32) -> Result<Vec<SlackMessage>, SourceError> {
        let token = self
            .config
            .user_token
            .as_ref()
            .ok_or_else(|| SourceError::NotConfigured("SLACK_USER_TOKEN".into()))?;

        let params = [
            ("query", query.to_string()),
            ("count", count.to_string()),
            ("sort", "timestamp".to_string()),
            ("sort_dir", "desc".to_string()),
        ];

        let body: SearchResponse = self
            .get("search.messages", token, &params)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse {
                source_name: "slack".into(),
                reason: e.to_string(),
            })?;

        if !body.ok {
            return Err(SourceError::Api {
                source_name: "slack".into(),
                code: body.error.unwrap_or_else(|| "unknown".into()),
            });
        }

        Ok(body.messages.map(|m| m.matches).unwrap_or_default())
    }
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Turns Slack API pages into conversations.
pub struct SlackAdapter<A> {
    api: A,
}

impl<A: SlackApi> SlackAdapter<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Collect every page of history, stopping at the first error.
    async fn collect_history(&self, channel_id: &str, oldest: i64, latest: i64) -> Vec<SlackMessage> {
        let mut collected = Vec::new();
        let mut query = HistoryQuery {
            channel: channel_id.to_string(),
            oldest,
            latest,
            cursor: None,
            limit: HISTORY_PAGE_LIMIT,
        };

        loop {
            match self.api.history_page(&query).await {
                Ok(page) => {
                    debug!(
                        channel = channel_id,
                        count = page.messages.len(),
                        "Fetched Slack history page"
                    );
                    collected.extend(page.messages);
                    match page.next_cursor {
                        Some(next) if query.cursor.as_deref() != Some(next.as_str()) => {
                            query.cursor = Some(next);
                        }
                        _ => break,
                    }
                }
                Err(e) => {
                    warn!(
                        channel = channel_id,
                        error = %e,
                        collected = collected.len(),
                        "Slack history fetch failed, returning partial result"
                    );
                    break;
                }
            }
        }

        collected
    }
}

#[async_trait]
impl<A: SlackApi> ChatSource for SlackAdapter<A> {
    async fn fetch(&self, channel_id: &str, oldest: i64, latest: i64) -> Conversation {
        let raw = self.collect_history(channel_id, oldest, latest).await;
        let conversation = to_conversation(raw);
        info!(
            channel = channel_id,
            oldest,
            latest,
            messages = conversation.len(),
            "Slack conversation fetched"
        );
        conversation
    }

    async fn search(&self, query: &str, count: u32) -> Conversation {
        match self.api.search_page(query, count).await {
            Ok(matches) => {
                let mut conversation = to_conversation(matches);
                conversation.messages.reverse();
                conversation
            }
            Err(e) => {
                warn!(query, error = %e, "Slack search failed");
                Conversation::default()
            }
        }
    }
}

/// Filter, name, format, and sort raw messages oldest first.
fn to_conversation(raw: Vec<SlackMessage>) -> Conversation {
    let mut keyed: Vec<(f64, ConversationMessage)> = raw
        .into_iter()
        .filter(|m| !is_channel_event(m))
        .map(|m| {
            let order = m.ts.parse::<f64>().unwrap_or(0.0);
            let message = ConversationMessage {
                sender: display_name(&m),
                text: m.text.clone().unwrap_or_default(),
                timestamp: format_slack_ts(&m.ts).unwrap_or_else(|| m.ts.clone()),
            };
            (order, message)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    Conversation::new(keyed.into_iter().map(|(_, m)| m).collect())
}

/// `channel_join`, `channel_name`, and the other channel housekeeping events.
pub fn is_channel_event(message: &SlackMessage) -> bool {
    message
        .subtype
        .as_deref()
        .is_some_and(|s| s.starts_with("channel_"))
}

/// Bot profile name, then a user-id label, then "Unknown".
pub fn display_name(message: &SlackMessage) -> String {
    if let Some(bot) = &message.bot_profile {
        return bot.name.clone().unwrap_or_else(|| "Unknown Bot".to_string());
    }
    if let Some(user) = &message.user {
        return format!("User {user}");
    }
    "Unknown".to_string()
}

/// Slack `ts` (`"1704067200.000100"`) as `%Y-%m-%d %H:%M:%S` UTC.
pub fn format_slack_ts(ts: &str) -> Option<String> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = format!("{frac:0<9}").get(..9)?.parse().ok()?;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}
