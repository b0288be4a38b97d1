use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use dotenv::dotenv;
use langfuse_chat_gateway::{
    logging, server, ChatOrchestrator, GatewayConfig, GatewayError, OpenAIChatFactory,
    SpanInstrumentor, TraceProvider, SPAN_NAME,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    logging::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "gateway exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), GatewayError> {
    let config = GatewayConfig::from_env()?;
    info!(?config, "configuration loaded");
    if config.openai_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; /chat requests will fail");
    }

    let provider = TraceProvider::initialize(&config.telemetry)?;

    let served = serve(&config, &provider).await;

    // Always flush, even when serving failed.
    if let Err(e) = provider.shutdown(config.telemetry.shutdown_timeout).await {
        warn!(error = %e, "trace provider shutdown incomplete");
    }

    served
}

async fn serve(config: &GatewayConfig, provider: &TraceProvider) -> Result<(), GatewayError> {
    let models = OpenAIChatFactory::new(
        &config.openai_base_url,
        config.provider_timeout,
        provider.tracer(),
    )?;

    let instrumentor = SpanInstrumentor::with_trace_attributes(
        provider.tracer(),
        config.langfuse.with_trace_name(SPAN_NAME),
    );
    let orchestrator = ChatOrchestrator::new(
        instrumentor,
        config.openai_api_key.clone(),
        config.model.clone(),
        Arc::new(models),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    server::serve(
        listener,
        server::router(Arc::new(orchestrator)),
        server::shutdown_signal(),
    )
    .await?;

    info!("HTTP server stopped");
    Ok(())
}
