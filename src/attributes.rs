//! Span attribute names for chat request traces
//!
//! Keys follow the OpenTelemetry GenAI and messaging conventions where they exist
//! and the Langfuse OTLP ingestion mapping everywhere else.

use opentelemetry::KeyValue;
use opentelemetry_semantic_conventions::attribute::{GEN_AI_REQUEST_MODEL, GEN_AI_SYSTEM};

/// Semantic attribute names stamped on the request span and the provider client span
pub struct ChatAttributes;

impl ChatAttributes {
    // GenAI request/response attributes
    pub const REQUEST_MODEL: &'static str = GEN_AI_REQUEST_MODEL;
    pub const SYSTEM: &'static str = GEN_AI_SYSTEM;
    pub const PROMPT: &'static str = "gen_ai.prompt";
    pub const COMPLETION: &'static str = "gen_ai.completion";

    // Messaging attributes describing the provider hop
    pub const DESTINATION_NAME: &'static str = "messaging.destination.name";
    pub const OPERATION: &'static str = "messaging.operation";

    // Langfuse metadata, surfaced under the observation's metadata tab
    pub const METADATA_ENDPOINT: &'static str = "langfuse.metadata.endpoint";
    pub const METADATA_FRAMEWORK: &'static str = "langfuse.metadata.framework";
}

/// Langfuse-specific OpenTelemetry span attribute names
pub struct LangfuseAttributes;

impl LangfuseAttributes {
    pub const TRACE_NAME: &'static str = "langfuse.trace.name";

    pub const OBSERVATION_TYPE: &'static str = "langfuse.observation.type";
    pub const OBSERVATION_INPUT: &'static str = "langfuse.observation.input";
    pub const OBSERVATION_OUTPUT: &'static str = "langfuse.observation.output";
    pub const OBSERVATION_MODEL: &'static str = "langfuse.observation.model.name";
    pub const OBSERVATION_USAGE_TOTAL: &'static str = "langfuse.observation.usage.total";

    pub const ENVIRONMENT: &'static str = "langfuse.environment";
    pub const RELEASE: &'static str = "langfuse.release";
}

/// Builder for the attributes recorded before the provider is called
#[derive(Default)]
pub struct RequestAttributesBuilder {
    attributes: Vec<KeyValue>,
}

impl RequestAttributesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            ChatAttributes::DESTINATION_NAME,
            destination.into(),
        ));
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(ChatAttributes::OPERATION, operation.into()));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(ChatAttributes::REQUEST_MODEL, model.into()));
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(ChatAttributes::PROMPT, prompt.into()));
        self
    }

    pub fn build(self) -> Vec<KeyValue> {
        self.attributes
    }
}

/// Builder for the attributes recorded once the provider has answered
#[derive(Default)]
pub struct CompletionAttributesBuilder {
    attributes: Vec<KeyValue>,
}

impl CompletionAttributesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(mut self, completion: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(ChatAttributes::COMPLETION, completion.into()));
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            ChatAttributes::METADATA_ENDPOINT,
            endpoint.into(),
        ));
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            ChatAttributes::METADATA_FRAMEWORK,
            framework.into(),
        ));
        self
    }

    pub fn build(self) -> Vec<KeyValue> {
        self.attributes
    }
}
