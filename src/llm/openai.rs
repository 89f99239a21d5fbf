//! OpenAI-compatible `/chat/completions` client (Together AI, OpenAI).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use crate::error::LlmError;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    provider: &'static str,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Self::with_timeout(provider, base_url, api_key, model, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        provider: &'static str,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: provider.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            provider,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        })
    }

    fn failed(&self, reason: impl ToString) -> LlmError {
        LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
        };

        debug!(provider = self.provider, model = %self.model, messages = request.messages.len(), "Calling chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.failed(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: self.provider.to_string(),
            });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited {
                provider: self.provider.to_string(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.failed(format!("{status}: {text}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: self.provider.to_string(),
            reason: e.to_string(),
        })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| LlmError::InvalidResponse {
            provider: self.provider.to_string(),
            reason: "no choices in response".into(),
        })?;
        let usage = parsed.usage.unwrap_or_default();

        debug!(
            provider = self.provider,
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "Chat completion received"
        );

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
            response_id: parsed.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn completion_round_trip() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer test-key");
                assert_eq!(body["model"], "meta-llama/Meta-Llama-3-8B-Instruct-Lite");
                assert_eq!(body["messages"][0]["role"], "system");
                assert!(body.get("temperature").is_none());
                Json(json!({
                    "id": "cmpl-1",
                    "choices": [{"message": {"role": "assistant", "content": "## Key Points"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 3}
                }))
            }),
        );
        let base = serve(router).await;
        let provider = OpenAiCompatProvider::new(
            "together",
            base,
            SecretString::from("test-key"),
            "meta-llama/Meta-Llama-3-8B-Instruct-Lite",
        )
        .unwrap();

        let request = CompletionRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user("hi")]);
        let response = provider.complete(request).await.unwrap();

        assert_eq!(response.content, "## Key Points");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.response_id.as_deref(), Some("cmpl-1"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_failed() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let provider =
            OpenAiCompatProvider::new("together", serve(router).await, SecretString::from("k"), "m").unwrap();
        let err = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let provider =
            OpenAiCompatProvider::new("together", serve(router).await, SecretString::from("k"), "m").unwrap();
        let err = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn slow_upstream_hits_client_timeout() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"choices": []}))
            }),
        );
        let provider = OpenAiCompatProvider::with_timeout(
            "together",
            serve(router).await,
            SecretString::from("k"),
            "m",
            Duration::from_millis(200),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let err = provider
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
