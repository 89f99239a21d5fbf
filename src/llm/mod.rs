//! LLM integration for Nosy Worker.
//!
//! Supports:
//! - **Together AI**: OpenAI-compatible endpoint (default)
//! - **OpenAI**: the same wire format against api.openai.com
//!
//! Both go through [`OpenAiCompatProvider`], which implements our
//! `LlmProvider` trait.

pub mod openai;
pub mod provider;

pub use openai::OpenAiCompatProvider;
pub use provider::*;

use std::sync::Arc;

use secrecy::SecretString;

use crate::error::{ConfigError, LlmError};

pub const TOGETHER_BASE_URL: &str = "https://api.together.xyz/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used for conversation summaries.
pub const DEFAULT_SUMMARY_MODEL: &str = "meta-llama/Meta-Llama-3-8B-Instruct-Lite";
/// Model used for action-item extraction.
pub const DEFAULT_ACTIONS_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo";

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Together,
    OpenAi,
}

impl LlmBackend {
    fn name(self) -> &'static str {
        match self {
            Self::Together => "together",
            Self::OpenAi => "openai",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Together => TOGETHER_BASE_URL,
            Self::OpenAi => OPENAI_BASE_URL,
        }
    }

    fn key_var(self) -> &'static str {
        match self {
            Self::Together => "TOGETHER_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    /// Read backend, key, and base URL from the environment. `model_var`
    /// names the variable that overrides `default_model`.
    ///
    /// `NOSY_LLM_BACKEND` selects `together` (default) or `openai`.
    pub fn from_env(model_var: &str, default_model: &str) -> Result<Self, ConfigError> {
        let backend = match std::env::var("NOSY_LLM_BACKEND").ok().as_deref() {
            None | Some("") | Some("together") => LlmBackend::Together,
            Some("openai") => LlmBackend::OpenAi,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "NOSY_LLM_BACKEND".into(),
                    message: format!("unknown backend `{other}`"),
                });
            }
        };

        let api_key = std::env::var(backend.key_var())
            .map_err(|_| ConfigError::MissingEnvVar(backend.key_var().into()))?;

        Ok(Self {
            backend,
            api_key: SecretString::from(api_key),
            model: std::env::var(model_var).unwrap_or_else(|_| default_model.to_string()),
            base_url: std::env::var("NOSY_LLM_BASE_URL")
                .unwrap_or_else(|_| backend.default_base_url().to_string()),
        })
    }

    /// Summary model config (`NOSY_SUMMARY_MODEL`).
    pub fn summary_from_env() -> Result<Self, ConfigError> {
        Self::from_env("NOSY_SUMMARY_MODEL", DEFAULT_SUMMARY_MODEL)
    }

    /// Extraction model config (`NOSY_ACTIONS_MODEL`).
    pub fn actions_from_env() -> Result<Self, ConfigError> {
        Self::from_env("NOSY_ACTIONS_MODEL", DEFAULT_ACTIONS_MODEL)
    }
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    tracing::info!("Using {} (model: {})", config.backend.name(), config.model);
    let provider = OpenAiCompatProvider::new(
        config.backend.name(),
        &config.base_url,
        config.api_key.clone(),
        &config.model,
    )?;
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_together_provider() {
        let config = LlmConfig {
            backend: LlmBackend::Together,
            api_key: SecretString::from("test-key"),
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            base_url: TOGETHER_BASE_URL.to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), DEFAULT_SUMMARY_MODEL);
    }

    #[test]
    fn test_create_openai_provider() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: SecretString::from("sk-test"),
            model: "gpt-4o".to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
        };
        assert_eq!(create_provider(&config).unwrap().model_name(), "gpt-4o");
    }
}
