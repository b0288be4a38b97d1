//! # langfuse-chat-gateway
//!
//! Minimal HTTP gateway that sends a fixed prompt to OpenAI on every `/chat` request and
//! records the exchange as an OpenTelemetry trace, exported over OTLP/HTTP to Langfuse.
//!
//! Each request produces:
//! - A server span `chat-handler` carrying `gen_ai.*`, `messaging.*` and
//!   `langfuse.metadata.*` attributes
//! - A client span for the provider call, recorded by [`OpenAITracingMiddleware`], with
//!   token usage
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use langfuse_chat_gateway::{
//!     server, ChatOrchestrator, GatewayConfig, OpenAIChatFactory, SpanInstrumentor,
//!     TraceProvider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env()?;
//! let provider = TraceProvider::initialize(&config.telemetry)?;
//!
//! let models = OpenAIChatFactory::new(
//!     &config.openai_base_url,
//!     config.provider_timeout,
//!     provider.tracer(),
//! )?;
//! let orchestrator = ChatOrchestrator::new(
//!     SpanInstrumentor::new(provider.tracer()),
//!     config.openai_api_key.clone(),
//!     config.model.clone(),
//!     Arc::new(models),
//! );
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! server::serve(listener, server::router(Arc::new(orchestrator)), server::shutdown_signal())
//!     .await?;
//! provider.shutdown(config.telemetry.shutdown_timeout).await?;
//! # Ok(())
//! # }
//! ```

mod attributes;
mod config;
mod context;
mod error;
mod langfuse;
mod llm;
pub mod logging;
mod middleware;
mod orchestrator;
pub mod server;
mod span;
mod telemetry;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use attributes::{
    ChatAttributes, CompletionAttributesBuilder, LangfuseAttributes, RequestAttributesBuilder,
};
pub use config::{GatewayConfig, TelemetryConfig};
pub use context::{LangfuseContext, LangfuseContextBuilder};
pub use error::{ChatError, ConfigError, GatewayError, ProviderError, TelemetryError};
pub use llm::{LanguageModel, LanguageModelFactory, OpenAIChat, OpenAIChatFactory};
pub use middleware::OpenAITracingMiddleware;
pub use orchestrator::{ChatOrchestrator, ChatResponse, CHAT_ENDPOINT, CHAT_PROMPT, SPAN_NAME};
pub use span::{RequestSpan, SpanInstrumentor};
pub use telemetry::{TraceProvider, TRACER_NAME};

// Re-export langfuse utilities
pub use langfuse::{build_langfuse_auth_header, build_otlp_endpoint, build_traces_endpoint};
