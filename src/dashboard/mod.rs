//! HTTP dashboard and JSON API.

pub mod error;
pub mod handlers;
pub mod page;

pub use error::ApiError;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tera::Tera;
use tower_http::cors::CorsLayer;

use crate::actions::ActionExtractor;
use crate::channels::ChannelRegistry;
use crate::mail::MailSender;
use crate::sources::{ChatSource, MailSource};
use crate::summarize::Summarizer;

/// Application state shared across handlers.
///
/// Every upstream is optional; routes that need a missing one answer 503.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChannelRegistry>,
    pub templates: Arc<Tera>,
    pub slack: Option<Arc<dyn ChatSource>>,
    pub outlook: Option<Arc<dyn MailSource>>,
    pub mailer: Option<Arc<dyn MailSender>>,
    pub summarizer: Option<Arc<Summarizer>>,
    pub extractor: Option<Arc<ActionExtractor>>,
    /// Where `all_actions.json` and `actions_by_client.json` are read from.
    pub actions_dir: PathBuf,
    /// Directories the extractor scans on refresh.
    pub summary_dirs: Vec<PathBuf>,
    /// Where generated summaries are saved, if enabled.
    pub save_summaries_to: Option<PathBuf>,
    /// Emails listed per Outlook summarize request.
    pub outlook_fetch_count: u32,
}

impl AppState {
    pub fn new(registry: Arc<ChannelRegistry>, templates: Tera) -> Self {
        Self {
            registry,
            templates: Arc::new(templates),
            slack: None,
            outlook: None,
            mailer: None,
            summarizer: None,
            extractor: None,
            actions_dir: PathBuf::from("part2"),
            summary_dirs: Vec::new(),
            save_summaries_to: None,
            outlook_fetch_count: 25,
        }
    }

    pub fn with_slack(mut self, slack: Arc<dyn ChatSource>) -> Self {
        self.slack = Some(slack);
        self
    }

    pub fn with_outlook(mut self, outlook: Arc<dyn MailSource>) -> Self {
        self.outlook = Some(outlook);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_actions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.actions_dir = dir.into();
        self
    }

    pub fn with_saved_summaries(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_summaries_to = Some(dir.into());
        self
    }

    pub fn with_outlook_fetch_count(mut self, count: u32) -> Self {
        self.outlook_fetch_count = count;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<ActionExtractor>, summary_dirs: Vec<PathBuf>) -> Self {
        self.extractor = Some(extractor);
        self.summary_dirs = summary_dirs;
        self
    }
}

/// Build the Axum router with the dashboard page and API routes.
pub fn dashboard_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/channels", get(handlers::list_channels))
        .route(
            "/api/channels/{id}/profile",
            get(handlers::get_profile).post(handlers::update_profile),
        )
        .route("/api/channels/{id}/summarize", post(handlers::summarize_channel))
        .route("/api/action-items", get(handlers::action_items))
        .route("/api/action-items-by-client", get(handlers::action_items_by_client))
        .route("/api/refresh-action-items", post(handlers::refresh_action_items))
        .route("/api/send-action-email", post(handlers::send_action_email))
        .route("/api/outlook/auth-status", get(handlers::outlook_auth_status))
        .route("/api/outlook/authenticate", post(handlers::outlook_authenticate))
        .route("/api/slack/search", get(handlers::slack_search))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
