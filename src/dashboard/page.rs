//! Server-rendered dashboard page.

use serde::Serialize;
use tera::{Context, Tera};

use crate::channels::Channel;

const DASHBOARD_TEMPLATE: &str = "dashboard.html";

/// Template engine with the dashboard page registered.
pub fn init_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(
        DASHBOARD_TEMPLATE,
        include_str!("../../templates/dashboard.html"),
    )?;
    Ok(tera)
}

/// One row in the channel list, with defaults already applied.
#[derive(Debug, Serialize)]
struct ChannelRow<'a> {
    id: &'a str,
    name: &'a str,
    kind: Option<String>,
    enabled: bool,
}

impl<'a> From<&'a Channel> for ChannelRow<'a> {
    fn from(channel: &'a Channel) -> Self {
        Self {
            id: &channel.id,
            name: channel.display_name(),
            kind: channel.kind.as_ref().map(ToString::to_string),
            enabled: channel.is_enabled(),
        }
    }
}

/// Render the page for `channels`. Enabled channels are listed separately.
pub fn render_dashboard(tera: &Tera, channels: &[Channel]) -> Result<String, tera::Error> {
    let rows: Vec<ChannelRow<'_>> = channels.iter().map(ChannelRow::from).collect();
    let enabled: Vec<&ChannelRow<'_>> = rows.iter().filter(|r| r.enabled).collect();

    let mut context = Context::new();
    context.insert("channels", &rows);
    context.insert("enabled_channels", &enabled);
    context.insert("channel_count", &rows.len());
    context.insert("enabled_count", &enabled.len());
    context.insert("version", env!("CARGO_PKG_VERSION"));
    tera.render(DASHBOARD_TEMPLATE, &context)
}
