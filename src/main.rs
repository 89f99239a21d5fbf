use std::sync::Arc;

use anyhow::Context;
use nosy_worker::actions::ActionExtractor;
use nosy_worker::channels::{ChannelRegistry, ChannelStore};
use nosy_worker::config::AppConfig;
use nosy_worker::dashboard::{AppState, dashboard_routes, page};
use nosy_worker::llm::{LlmConfig, create_provider};
use nosy_worker::mail::{EmailConfig, MailSender, SmtpMailer};
use nosy_worker::sources::{OutlookConfig, OutlookMailbox, SlackAdapter, SlackConfig, SlackWebApi};
use nosy_worker::summarize::Summarizer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("🔎 Nosy Worker v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Dashboard: http://{}/", config.bind_address());
    eprintln!("   Channels: {}", config.channels_path.display());
    eprintln!("   Action items: {}", config.actions_dir.display());

    let registry = ChannelRegistry::open(ChannelStore::new(&config.channels_path)).await;
    let templates = page::init_templates().context("Failed to load dashboard template")?;

    let mut state = AppState::new(registry, templates).with_actions_dir(&config.actions_dir);

    // ── Slack ───────────────────────────────────────────────────────────
    match SlackConfig::from_env() {
        Some(slack) => {
            eprintln!("   Slack: enabled");
            let api = SlackWebApi::new(slack).context("Failed to build Slack client")?;
            state = state.with_slack(Arc::new(SlackAdapter::new(api)));
        }
        None => eprintln!("   Slack: disabled (SLACK_BOT_TOKEN not set)"),
    }

    // ── Outlook ─────────────────────────────────────────────────────────
    let outlook_config = OutlookConfig::from_env();
    eprintln!(
        "   Outlook: {} {}",
        outlook_config.node_binary,
        outlook_config.script.display()
    );
    let outlook = Arc::new(OutlookMailbox::new(outlook_config));
    state = state
        .with_outlook_fetch_count(outlook.fetch_count())
        .with_outlook(outlook.clone());

    // ── Mail ────────────────────────────────────────────────────────────
    let mailer: Arc<dyn MailSender> = match EmailConfig::from_env() {
        Some(email) => {
            eprintln!("   Mail: SMTP via {}", email.smtp_host);
            Arc::new(SmtpMailer::new(email))
        }
        None => {
            eprintln!("   Mail: Outlook");
            outlook
        }
    };
    state = state.with_mailer(mailer);

    // ── LLM ─────────────────────────────────────────────────────────────
    match LlmConfig::summary_from_env() {
        Ok(llm) => {
            eprintln!("   Summary model: {}", llm.model);
            let provider = create_provider(&llm).context("Failed to build summary model client")?;
            state = state.with_summarizer(Arc::new(Summarizer::new(provider)));
        }
        Err(e) => eprintln!("   Summaries: disabled ({e})"),
    }
    match LlmConfig::actions_from_env() {
        Ok(llm) => {
            eprintln!("   Actions model: {}", llm.model);
            let provider = create_provider(&llm).context("Failed to build actions model client")?;
            let extractor = ActionExtractor::new(provider, &config.actions_dir);
            state = state.with_extractor(Arc::new(extractor), config.summary_dirs.clone());
        }
        Err(e) => eprintln!("   Action refresh: disabled ({e})"),
    }

    if config.save_summaries {
        eprintln!("   Saving summaries to {}", config.results_dir.display());
        state = state.with_saved_summaries(&config.results_dir);
    }

    let app = dashboard_routes(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;
    tracing::info!(address = %config.bind_address(), "Dashboard server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
