//! Route handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::AppState;
use super::error::ApiError;
use super::page::render_dashboard;
use crate::actions::{ACTIONS_BY_CLIENT_FILE, ALL_ACTIONS_FILE, read_artifact};
use crate::channels::{Channel, ChannelKind, ChannelProfile};
use crate::error::MailError;
use crate::mail::{ActionDetails, compose_action_email};
use crate::sources::{Conversation, TimeWindow};
use crate::summarize::{render_html, save_summary};

/// Default and maximum `count` for Slack search.
const SEARCH_DEFAULT_COUNT: u32 = 20;
const SEARCH_MAX_COUNT: u32 = 100;

// ── Page & health ───────────────────────────────────────────────────────

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let channels = state.registry.list().await;
    render_dashboard(&state.templates, &channels)
        .map(Html)
        .map_err(|e| ApiError::Internal(format!("Failed to render dashboard: {e}")))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "nosy-worker"
    }))
}

// ── Channels ────────────────────────────────────────────────────────────

pub async fn list_channels(State(state): State<AppState>) -> Json<Vec<Channel>> {
    Json(state.registry.list().await)
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let channel = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound("Channel not found".into()))?;

    Ok(Json(json!({
        "success": true,
        "profile": channel.profile,
        "name": channel.display_name(),
    })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ChannelProfile>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if state.registry.get(&id).await.is_none() {
        return Err(ApiError::NotFound("Channel not found".into()));
    }
    let Json(profile) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    let channel = state.registry.update_profile(&id, profile).await?;
    Ok(Json(json!({
        "success": true,
        "profile": channel.profile,
    })))
}

// ── Summarize ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// Where a summarize request reads from.
#[derive(Debug, Clone, Copy)]
enum SummarySource<'a> {
    Slack(&'a str),
    Outlook(&'a str),
}

impl SummarySource<'_> {
    fn name(self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Outlook(_) => "outlook",
        }
    }
}

pub async fn summarize_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let channel = state
        .registry
        .get(&id)
        .await
        .ok_or_else(|| ApiError::NotFound("Channel not found".into()))?;

    let source = match &channel.kind {
        Some(ChannelKind::Slack) => channel
            .slack_channel_id
            .as_deref()
            .map(SummarySource::Slack)
            .ok_or_else(|| ApiError::NotFound("Channel not found or not configured for Slack".into()))?,
        Some(ChannelKind::Outlook) => channel
            .outlook_folder
            .as_deref()
            .map(SummarySource::Outlook)
            .ok_or_else(|| ApiError::NotFound("Channel not found or not configured for Outlook".into()))?,
        Some(ChannelKind::Unsupported(kind)) => {
            return Err(ApiError::Validation(format!("Unsupported channel type `{kind}`")));
        }
        None => return Err(ApiError::Validation("Channel has no type".into())),
    };

    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let start = request
        .start_time
        .ok_or_else(|| ApiError::Validation("startTime is required".into()))?;
    let end = request
        .end_time
        .ok_or_else(|| ApiError::Validation("endTime is required".into()))?;
    let window = TimeWindow::from_iso(&start, &end).map_err(ApiError::Validation)?;

    let conversation = match source {
        SummarySource::Slack(slack_id) => {
            let slack = state
                .slack
                .as_ref()
                .ok_or_else(|| ApiError::Unavailable("Slack is not configured".into()))?;
            slack.fetch(slack_id, window.start, window.end).await
        }
        SummarySource::Outlook(folder) => {
            let outlook = state
                .outlook
                .as_ref()
                .ok_or_else(|| ApiError::Unavailable("Outlook is not configured".into()))?;
            outlook
                .fetch_folder(folder, state.outlook_fetch_count, window)
                .await?
        }
    };

    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Summarization model is not configured".into()))?;
    let markdown = summarizer.summarize_conversation(&conversation).await?;

    if let Some(dir) = &state.save_summaries_to
        && !conversation.is_empty()
        && let Err(e) = save_summary(dir, &channel.id, &markdown).await
    {
        warn!(channel_id = %channel.id, error = %e, "Failed to save summary");
    }

    info!(channel_id = %channel.id, source = source.name(), messages = conversation.len(), "Channel summarized");
    Ok(Json(json!({
        "success": true,
        "summary": render_html(&markdown),
        "markdown_summary": markdown,
        "message_count": conversation.len(),
    })))
}

// ── Action items ────────────────────────────────────────────────────────

async fn artifact_response(state: &AppState, file: &str) -> Result<Json<Value>, ApiError> {
    let path = state.actions_dir.join(file);
    read_artifact::<Value>(&path)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No action items have been generated yet".into()))
}

pub async fn action_items(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    artifact_response(&state, ALL_ACTIONS_FILE).await
}

pub async fn action_items_by_client(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    artifact_response(&state, ACTIONS_BY_CLIENT_FILE).await
}

pub async fn refresh_action_items(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let extractor = state
        .extractor
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Action extraction model is not configured".into()))?;
    let report = extractor.run(&state.summary_dirs).await?;
    Ok(Json(json!({
        "success": true,
        "report": report,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SendActionEmailRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub action: Option<ActionDetails>,
}

pub async fn send_action_email(
    State(state): State<AppState>,
    body: Result<Json<SendActionEmailRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let to = request.to.trim();
    if to.is_empty() {
        return Err(ApiError::Validation("Recipient `to` is required".into()));
    }

    let subject = match request.subject.trim() {
        "" => match &request.action {
            Some(action) if !action.action.is_empty() => format!("Follow-up: {}", action.action),
            _ => "Action item follow-up".to_string(),
        },
        subject => subject.to_string(),
    };
    let body = compose_action_email(&request.message, request.action.as_ref());
    if body.is_empty() {
        return Err(ApiError::Validation("Email needs a message or an action".into()));
    }

    let mailer = state.mailer.as_ref().ok_or(MailError::NotConfigured)?;
    let confirmation = mailer.send(to, &subject, &body).await?;

    Ok(Json(json!({
        "success": true,
        "message": confirmation,
        "transport": mailer.transport(),
    })))
}

// ── Outlook auth ────────────────────────────────────────────────────────

pub async fn outlook_auth_status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let outlook = state
        .outlook
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Outlook is not configured".into()))?;
    let authenticated = outlook.check_auth().await?;
    Ok(Json(json!({
        "success": true,
        "authenticated": authenticated,
    })))
}

pub async fn outlook_authenticate(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let outlook = state
        .outlook
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Outlook is not configured".into()))?;
    let start = outlook.authenticate().await?;
    Ok(Json(json!({
        "success": true,
        "auth_url": start.auth_url,
        "message": start.message,
    })))
}

// ── Slack search ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub count: Option<u32>,
}

pub async fn slack_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("query is required".into()));
    }
    let count = params
        .count
        .unwrap_or(SEARCH_DEFAULT_COUNT)
        .clamp(1, SEARCH_MAX_COUNT);

    let slack = state
        .slack
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Slack is not configured".into()))?;
    let messages: Conversation = slack.search(query, count).await;

    Ok(Json(json!({
        "success": true,
        "messages": messages,
    })))
}
