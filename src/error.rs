//! Error types for Nosy Worker.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Channel not found: {0}")]
    NotFound(String),

    #[error("Duplicate channel id: {0}")]
    DuplicateId(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed channel file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the Slack and Outlook source adapters.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{source_name} request failed: {reason}")]
    RequestFailed { source_name: String, reason: String },

    #[error("{source_name} API error: {code}")]
    Api { source_name: String, code: String },

    #[error("{source_name} rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        source_name: String,
        retry_after_secs: u64,
    },

    #[error("Invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),
}

impl SourceError {
    pub(crate) fn slack_request(e: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            source_name: "slack".into(),
            reason: e.to_string(),
        }
    }
}

/// MCP client (stdio JSON-RPC) errors.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Subprocess I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Subprocess closed its output")]
    Closed,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Tool {name} reported an error: {message}")]
    ToolFailed { name: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outgoing mail errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("No mail transport configured")]
    NotConfigured,

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Send via {transport} failed: {reason}")]
    SendFailed { transport: String, reason: String },
}

/// Action-item extraction errors. Per-file failures are not errors; only
/// conditions that stop the whole batch end up here.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
