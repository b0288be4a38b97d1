use crate::attributes::{ChatAttributes, LangfuseAttributes};
use http::Extensions;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer as SdkTracer;
use opentelemetry_semantic_conventions::attribute::{
    ERROR_TYPE, GEN_AI_OPERATION_NAME, GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS,
    HTTP_RESPONSE_STATUS_CODE,
};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use serde_json::{json, Value};

/// Middleware that records a client span for every chat-completions call.
///
/// The parent is whatever [`Context`] the caller attached to the request with
/// `RequestBuilder::with_extension`; without one the span starts a new trace.
pub struct OpenAITracingMiddleware {
    tracer: SdkTracer,
}

impl OpenAITracingMiddleware {
    pub fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }

    fn extract_operation_from_path(path: &str) -> (&str, &str) {
        if path.contains("/chat/completions") {
            ("chat", "chat.completions")
        } else if path.contains("/completions") {
            ("completion", "completions")
        } else {
            ("unknown", "unknown")
        }
    }
}

#[async_trait::async_trait]
impl Middleware for OpenAITracingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let parent = extensions.get::<Context>().cloned().unwrap_or_default();

        let path = req.url().path().to_string();
        let (operation_type, operation_name) = Self::extract_operation_from_path(&path);

        let mut attributes = vec![
            KeyValue::new(ChatAttributes::SYSTEM, "openai"),
            KeyValue::new(GEN_AI_OPERATION_NAME, operation_type.to_string()),
            KeyValue::new(LangfuseAttributes::OBSERVATION_TYPE, "generation"),
        ];

        // Parse the request body for the model and the messages sent
        if let Some(json) = req
            .body()
            .and_then(|body| body.as_bytes())
            .and_then(|bytes| serde_json::from_slice::<Value>(bytes).ok())
        {
            if let Some(model) = json
                .get("model")
                .and_then(|m| m.as_str())
                .filter(|m| !m.is_empty())
            {
                attributes.push(KeyValue::new(ChatAttributes::REQUEST_MODEL, model.to_string()));
                attributes.push(KeyValue::new(
                    LangfuseAttributes::OBSERVATION_MODEL,
                    model.to_string(),
                ));
            }
            if let Some(messages) = json.get("messages") {
                attributes.push(KeyValue::new(
                    LangfuseAttributes::OBSERVATION_INPUT,
                    json!({ "messages": messages }).to_string(),
                ));
            }
        }

        let mut span = self
            .tracer
            .span_builder(format!("OpenAI {}", operation_name))
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &parent);

        let response = match next.run(req, extensions).await {
            Ok(res) => {
                let status = res.status();
                span.set_attribute(KeyValue::new(
                    HTTP_RESPONSE_STATUS_CODE,
                    status.as_u16() as i64,
                ));

                if status.is_success() {
                    // Buffer the body so it can be inspected and handed back
                    let headers = res.headers().clone();
                    match res.bytes().await {
                        Ok(bytes) => {
                            if let Ok(response_json) = serde_json::from_slice::<Value>(&bytes) {
                                record_response(&mut span, &response_json);
                            }
                            span.set_status(Status::Ok);

                            let mut rebuilt = http::Response::new(bytes);
                            *rebuilt.status_mut() = status;
                            *rebuilt.headers_mut() = headers;
                            Ok(Response::from(rebuilt))
                        }
                        Err(e) => {
                            span.set_status(Status::error(format!(
                                "Failed to read response body: {}",
                                e
                            )));
                            span.set_attribute(KeyValue::new(ERROR_TYPE, "body_read"));
                            Err(reqwest_middleware::Error::Reqwest(e))
                        }
                    }
                } else {
                    span.set_status(Status::error(format!("HTTP {}", status)));
                    span.set_attribute(KeyValue::new(ERROR_TYPE, status.as_u16().to_string()));
                    Ok(res)
                }
            }
            Err(e) => {
                span.set_status(Status::error(format!("Request failed: {}", e)));
                span.set_attribute(KeyValue::new(ERROR_TYPE, "transport"));
                Err(e)
            }
        };

        span.end();

        response
    }
}

/// Copy the first choice's message and the token usage onto the span.
fn record_response<S: Span>(span: &mut S, response_json: &Value) {
    if let Some(message) = response_json
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
    {
        span.set_attribute(KeyValue::new(
            LangfuseAttributes::OBSERVATION_OUTPUT,
            json!({ "choices": [{ "message": message }] }).to_string(),
        ));
    }

    if let Some(usage) = response_json.get("usage") {
        if let Some(prompt_tokens) = usage.get("prompt_tokens").and_then(|v| v.as_i64()) {
            span.set_attribute(KeyValue::new(GEN_AI_USAGE_INPUT_TOKENS, prompt_tokens));
        }
        if let Some(completion_tokens) = usage.get("completion_tokens").and_then(|v| v.as_i64()) {
            span.set_attribute(KeyValue::new(GEN_AI_USAGE_OUTPUT_TOKENS, completion_tokens));
        }
        // Total tokens is not in semantic conventions, but Langfuse reads it
        if let Some(total_tokens) = usage.get("total_tokens").and_then(|v| v.as_i64()) {
            span.set_attribute(KeyValue::new(
                LangfuseAttributes::OBSERVATION_USAGE_TOTAL,
                total_tokens,
            ));
        }
    }
}
