use std::time::Duration;

use thiserror::Error;

/// Invalid startup configuration. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Failures of the trace pipeline.
///
/// `Exporter` and `Resource` are raised by [`crate::TraceProvider::initialize`] and keep
/// the process from starting. The shutdown variants are logged and never escalated.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to create trace exporter: {0}")]
    Exporter(String),

    #[error("failed to create resource: {0}")]
    Resource(String),

    #[error("failed to flush spans: {0}")]
    Flush(String),

    #[error("tracer provider shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("error shutting down tracer provider: {0}")]
    Shutdown(String),
}

/// A failed call to the language-model provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to build provider client: {0}")]
    Client(String),

    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Request-scoped failure of the chat endpoint.
///
/// `Display` carries the detailed cause for logs and spans; [`ChatError::public_message`]
/// is the short text returned to HTTP callers.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("OPENAI_API_KEY environment variable not set")]
    MissingCredential,

    #[error("failed to create OpenAI client: {0}")]
    Connect(#[source] ProviderError),

    #[error("failed to generate content: {0}")]
    Provider(#[source] ProviderError),
}

impl ChatError {
    pub fn public_message(&self) -> &'static str {
        match self {
            ChatError::MissingCredential => "OPENAI_API_KEY environment variable not set",
            ChatError::Connect(_) => "Failed to create OpenAI client",
            ChatError::Provider(_) => "Failed to generate content",
        }
    }

    /// Value recorded as `error.type` on the request span.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::MissingCredential => "config",
            ChatError::Connect(_) | ChatError::Provider(_) => "provider",
        }
    }
}

/// Top-level error of the gateway binary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
