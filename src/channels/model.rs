//! Channel records as stored in `channels.json`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where a channel's conversations come from.
///
/// Any other `type` string is kept verbatim so a save writes it back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelKind {
    Slack,
    Outlook,
    Unsupported(String),
}

impl From<String> for ChannelKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "slack" => Self::Slack,
            "outlook" => Self::Outlook,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<ChannelKind> for String {
    fn from(value: ChannelKind) -> Self {
        match value {
            ChannelKind::Slack => "slack".to_string(),
            ChannelKind::Outlook => "outlook".to_string(),
            ChannelKind::Unsupported(raw) => raw,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slack => f.write_str("slack"),
            Self::Outlook => f.write_str("outlook"),
            Self::Unsupported(raw) => f.write_str(raw),
        }
    }
}

/// Who a channel's summaries are for and what else feeds them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub audience: String,
    #[serde(default)]
    pub data_sources: Vec<String>,
}

/// A configured conversation channel.
///
/// Absent fields stay absent and unknown fields are carried in `extra`, so a
/// load/save cycle leaves every record as it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChannelKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlook_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ChannelProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Channel {
    /// A Slack channel bound to a Slack conversation id.
    pub fn slack(id: impl Into<String>, name: impl Into<String>, slack_id: impl Into<String>) -> Self {
        Self {
            slack_channel_id: Some(slack_id.into()),
            ..Self::named(id, name, ChannelKind::Slack)
        }
    }

    /// An Outlook channel reading from a mail folder.
    pub fn outlook(id: impl Into<String>, name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            outlook_folder: Some(folder.into()),
            ..Self::named(id, name, ChannelKind::Outlook)
        }
    }

    fn named(id: impl Into<String>, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            kind: Some(kind),
            enabled: Some(true),
            slack_channel_id: None,
            outlook_folder: None,
            profile: None,
            extra: Map::new(),
        }
    }

    pub fn with_profile(mut self, profile: ChannelProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Name for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// A channel without an `enabled` flag counts as enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// On-disk wrapper: `{"channels": [...]}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ChannelsFile {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_stored_channel_shape() {
        let json = r#"{
            "id": "1",
            "name": "Customer Support",
            "type": "slack",
            "enabled": true,
            "slack_channel_id": "C08V",
            "profile": {"audience": "Customer Success Team", "dataSources": ["Support Tickets"]}
        }"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.kind, Some(ChannelKind::Slack));
        assert_eq!(channel.slack_channel_id.as_deref(), Some("C08V"));
        assert!(channel.extra.is_empty());
        let profile = channel.profile.unwrap();
        assert_eq!(profile.data_sources, vec!["Support Tickets".to_string()]);
    }

    #[test]
    fn unknown_type_is_kept_verbatim() {
        let channel: Channel = serde_json::from_str(r#"{"id": "x", "type": "teams"}"#).unwrap();
        assert_eq!(channel.kind, Some(ChannelKind::Unsupported("teams".into())));
        assert!(channel.is_enabled());
        assert_eq!(channel.display_name(), "x");

        let value = serde_json::to_value(&channel).unwrap();
        assert_eq!(value, json!({"id": "x", "type": "teams"}));
    }

    #[test]
    fn missing_type_is_none_and_not_serialized() {
        let channel: Channel = serde_json::from_str(r#"{"id": "x", "name": "n"}"#).unwrap();
        assert_eq!(channel.kind, None);
        let value = serde_json::to_value(&channel).unwrap();
        assert!(value.get("type").is_none());
        assert!(value.get("profile").is_none());
        assert!(value.get("enabled").is_none());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "id": "t",
            "type": "teams",
            "webhook": "https://example.invalid/hook",
            "owners": ["ops"]
        });
        let channel: Channel = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(channel.extra["owners"], json!(["ops"]));
        assert_eq!(serde_json::to_value(&channel).unwrap(), raw);
    }

    #[test]
    fn profile_uses_camel_case_on_the_wire() {
        let profile = ChannelProfile {
            audience: "Sales".into(),
            data_sources: vec!["CRM Data".into()],
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["dataSources"][0], "CRM Data");
    }
}
