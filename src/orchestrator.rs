//! Per-request chat flow.
//!
//! Start → Validate → Connect → Invoke → Annotate → Respond, with every path ending
//! the request span exactly once.

use std::sync::Arc;

use opentelemetry::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attributes::{CompletionAttributesBuilder, RequestAttributesBuilder};
use crate::error::ChatError;
use crate::llm::LanguageModelFactory;
use crate::span::{RequestSpan, SpanInstrumentor};

/// Name of the span wrapping each `/chat` request.
pub const SPAN_NAME: &str = "chat-handler";
pub const CHAT_PROMPT: &str = "Reply with `golang`";
pub const CHAT_ENDPOINT: &str = "/chat";
pub const PROVIDER_NAME: &str = "openai";
pub const MESSAGING_OPERATION: &str = "process";
/// Reported as `langfuse.metadata.framework`.
pub const FRAMEWORK: &str = "reqwest-middleware";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

pub struct ChatOrchestrator {
    instrumentor: SpanInstrumentor,
    api_key: Option<String>,
    model: String,
    models: Arc<dyn LanguageModelFactory>,
}

impl ChatOrchestrator {
    pub fn new(
        instrumentor: SpanInstrumentor,
        api_key: Option<String>,
        model: impl Into<String>,
        models: Arc<dyn LanguageModelFactory>,
    ) -> Self {
        Self {
            instrumentor,
            api_key,
            model: model.into(),
            models,
        }
    }

    /// Run one chat request under a new span parented on `parent`.
    ///
    /// Errors are returned to the caller after being recorded on the span; they never
    /// outlive the request.
    pub async fn handle(&self, parent: &Context) -> Result<ChatResponse, ChatError> {
        let mut span = self.instrumentor.start_span(parent, SPAN_NAME);

        let outcome = self.run(&mut span).await;
        if let Err(err) = &outcome {
            warn!(error = %err, kind = err.kind(), "chat request failed");
            span.record_failure(err.kind(), err);
        }
        span.finish();

        outcome
    }

    async fn run(&self, span: &mut RequestSpan) -> Result<ChatResponse, ChatError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ChatError::MissingCredential)?;

        let llm = self.models.connect(api_key).map_err(ChatError::Connect)?;

        span.set_attributes(
            RequestAttributesBuilder::new()
                .with_destination(PROVIDER_NAME)
                .with_operation(MESSAGING_OPERATION)
                .with_model(self.model.as_str())
                .with_prompt(CHAT_PROMPT)
                .build(),
        );

        let cx = span.context().clone();
        let result = llm
            .generate(&cx, &self.model, CHAT_PROMPT)
            .await
            .map_err(ChatError::Provider)?;
        info!(response = %result, "AI response");

        span.set_attributes(
            CompletionAttributesBuilder::new()
                .with_completion(result.as_str())
                .with_endpoint(CHAT_ENDPOINT)
                .with_framework(FRAMEWORK)
                .build(),
        );

        Ok(ChatResponse { response: result })
    }
}
