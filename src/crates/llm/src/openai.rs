//! OpenAI-compatible chat-completions adapter.
//!
//! Speaks the `/chat/completions` wire format, which is the de facto
//! interface of most self-hosted inference servers as well as OpenAI
//! itself. Transient transport failures and 5xx/429 responses are retried
//! under a bounded [`RetryPolicy`]; anything else is surfaced immediately.

use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::request::LlmRequest;
use crate::response::LlmResponse;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
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

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

impl OpenAiCompatClient {
    /// Create a client for the given endpoint and model.
    ///
    /// `base_url` is the API root (for example `https://api.openai.com/v1`
    /// or `http://localhost:8000/v1`).
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn body(&self, request: &LlmRequest) -> Value {
        json!({
            "model": self.model,
            "messages": request
                .messages
                .iter()
                .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
                .collect::<Vec<_>>(),
            "temperature": request.temperature,
            "top_p": request.top_p,
            "max_tokens": request.max_tokens,
        })
    }

    async fn call_once(&self, body: &Value) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;
        let content = choice.message.content.unwrap_or_default();

        let mut llm_response = LlmResponse::from_raw(content);
        if let Some(usage) = parsed.usage {
            llm_response = llm_response.with_tokens_used(usage.total_tokens);
        }
        if let Some(model) = parsed.model {
            llm_response = llm_response.with_metadata("model", json!(model));
        }
        if let Some(reason) = choice.finish_reason {
            llm_response = llm_response.with_metadata("finish_reason", json!(reason));
        }
        Ok(llm_response)
    }

    fn is_transient(error: &LlmError) -> bool {
        match error {
            LlmError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = self.body(&request);
        let mut attempt = 0usize;
        loop {
            match self.call_once(&body).await {
                Ok(response) => {
                    debug!(
                        model = %self.model,
                        tokens = response.tokens_used,
                        "llm call completed"
                    );
                    return Ok(response);
                }
                Err(e) if Self::is_transient(&e) && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient llm failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if Self::is_transient(&e) => {
                    return Err(LlmError::RetriesExhausted {
                        attempts: attempt + 1,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(OpenAiCompatClient::is_transient(&LlmError::Api {
            status: 500,
            body: String::new()
        }));
        assert!(OpenAiCompatClient::is_transient(&LlmError::Api {
            status: 429,
            body: String::new()
        }));
        assert!(!OpenAiCompatClient::is_transient(&LlmError::Api {
            status: 400,
            body: String::new()
        }));
        assert!(!OpenAiCompatClient::is_transient(
            &LlmError::InvalidResponse("x".into())
        ));
    }

    #[test]
    fn body_carries_generation_settings() {
        let client = OpenAiCompatClient::new(
            "http://localhost:8000/v1/",
            "test-model",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        let body = client.body(
            &LlmRequest::from_prompt("hi")
                .with_temperature(0.0)
                .with_max_tokens(16),
        );
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 16);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiCompatClient::new(
            "http://localhost:8000/v1/",
            "m",
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8000/v1");
    }
}
