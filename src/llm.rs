//! Language-model call adapter.
//!
//! [`LanguageModel`] is the seam the orchestrator calls through; [`OpenAIChat`] is the
//! production implementation, posting one chat-completions request per call through a
//! [`reqwest_middleware`] client that carries [`OpenAITracingMiddleware`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::Context;
use opentelemetry_sdk::trace::Tracer;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;
use crate::middleware::OpenAITracingMiddleware;

/// One-shot text generation against an external provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` to `model` and return the generated text.
    ///
    /// `cx` carries the caller's span; implementations parent their own spans under it.
    /// No retries are attempted.
    async fn generate(&self, cx: &Context, model: &str, prompt: &str)
        -> Result<String, ProviderError>;
}

/// Builds a [`LanguageModel`] for a given credential.
pub trait LanguageModelFactory: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LanguageModel>, ProviderError>;
}

/// Factory for [`OpenAIChat`] adapters sharing one instrumented HTTP client.
pub struct OpenAIChatFactory {
    client: ClientWithMiddleware,
    base_url: String,
}

impl OpenAIChatFactory {
    pub fn new(base_url: &str, timeout: Duration, tracer: Tracer) -> Result<Self, ProviderError> {
        let reqwest_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;
        let client = ClientBuilder::new(reqwest_client)
            .with(OpenAITracingMiddleware::new(tracer))
            .build();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl LanguageModelFactory for OpenAIChatFactory {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LanguageModel>, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Client("missing API key".to_string()));
        }
        Ok(Arc::new(OpenAIChat {
            client: self.client.clone(),
            endpoint: format!("{}/chat/completions", self.base_url),
            api_key: api_key.to_string(),
        }))
    }
}

/// OpenAI chat-completions adapter bound to one API key.
pub struct OpenAIChat {
    client: ClientWithMiddleware,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    async fn generate(
        &self,
        cx: &Context,
        model: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let body = serde_json::to_vec(&ChatCompletionRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        })
        .map_err(|e| ProviderError::Client(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .with_extension(cx.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(reqwest_middleware::Error::Reqwest(e)))?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("response has no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();
        debug!(model, chars = content.len(), "provider returned completion");
        Ok(content)
    }
}
