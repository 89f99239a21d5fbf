//! Action items produced from summaries.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action urgency. Values outside high/medium/low are kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
    Other(String),
}

impl From<String> for Priority {
    fn from(value: String) -> Self {
        match value.as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Other(value),
        }
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Medium => f.write_str("medium"),
            Self::Low => f.write_str("low"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Which team owns an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    #[default]
    Support,
    Training,
    Documentation,
    Design,
    Communication,
    Other(String),
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.as_str() {
            "support" => Self::Support,
            "training" => Self::Training,
            "documentation" => Self::Documentation,
            "design" => Self::Design,
            "communication" => Self::Communication,
            _ => Self::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => f.write_str("support"),
            Self::Training => f.write_str("training"),
            Self::Documentation => f.write_str("documentation"),
            Self::Design => f.write_str("design"),
            Self::Communication => f.write_str("communication"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// One element of the model's JSON array, before metadata is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawAction {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub action: String,
    pub reasoning: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    pub client: String,
    pub source_file: String,
    pub generated_at: DateTime<Utc>,
}

impl ActionItem {
    /// Attach attribution to a raw action, filling priority/category defaults.
    pub fn from_raw(
        raw: RawAction,
        client: &str,
        source_file: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            action: raw.action,
            reasoning: raw.reasoning,
            priority: raw.priority.unwrap_or_default(),
            category: raw.category.unwrap_or_default(),
            client: client.to_string(),
            source_file: source_file.to_string(),
            generated_at,
        }
    }
}
