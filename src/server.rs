//! HTTP surface of the gateway.
//!
//! # Responsibilities
//! - Route `/chat` (any method) to the [`ChatOrchestrator`]
//! - Join a caller's trace when a W3C `traceparent` header is present
//! - Map request failures to short plain-text 500 responses
//! - Serve until SIGINT/SIGTERM, then drain in-flight requests

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::ChatError;
use crate::orchestrator::{ChatOrchestrator, ChatResponse, CHAT_ENDPOINT};

/// Build the axum router serving the chat endpoint.
pub fn router(orchestrator: Arc<ChatOrchestrator>) -> Router {
    Router::new()
        .route(CHAT_ENDPOINT, any(chat_handler))
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
}

async fn chat_handler(
    State(orchestrator): State<Arc<ChatOrchestrator>>,
    headers: HeaderMap,
) -> Result<Json<ChatResponse>, ChatError> {
    let parent = extract_parent_context(&headers);
    orchestrator.handle(&parent).await.map(Json)
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.public_message()).into_response()
    }
}

/// Read the caller's W3C trace context, if any, from request headers.
pub fn extract_parent_context(headers: &HeaderMap) -> Context {
    TraceContextPropagator::new().extract(&HeaderMapExtractor(headers))
}

struct HeaderMapExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderMapExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
