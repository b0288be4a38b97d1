//! Trace provider lifecycle.
//!
//! [`TraceProvider`] owns the export pipeline for the whole process: an OTLP/HTTP
//! exporter behind a batch span processor running on the tokio runtime, an always-on
//! sampler and the service resource. It is constructed explicitly at startup and handed
//! to whatever needs a tracer; nothing is registered globally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::export::trace::SpanExporter;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, Sampler, Tracer, TracerProvider,
};
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing::{debug, info};

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;

/// Instrumentation scope name of every span this crate records.
pub const TRACER_NAME: &str = "langfuse-chat-gateway";

/// Process-wide span export pipeline.
///
/// Cloning shares the same pipeline. [`TraceProvider::shutdown`] flushes it once; if the
/// process unwinds before that, dropping the last handle shuts the SDK pipeline down.
#[derive(Clone)]
pub struct TraceProvider {
    inner: TracerProvider,
    shut_down: Arc<AtomicBool>,
}

impl TraceProvider {
    /// Build the OTLP/HTTP exporter described by `config` and the pipeline around it.
    ///
    /// Must be called from within a tokio runtime, which hosts the batch export task.
    pub fn initialize(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let mut builder = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_timeout(config.export_timeout)
            .with_headers(config.headers.clone());
        if let Some(endpoint) = &config.traces_endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        let exporter = builder
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

        let provider = Self::with_exporter(exporter, config)?;
        info!(
            endpoint = config
                .traces_endpoint
                .as_deref()
                .unwrap_or("exporter default"),
            service_name = %config.service_name,
            "trace provider initialized"
        );
        Ok(provider)
    }

    /// Build the batching pipeline around an arbitrary exporter.
    pub fn with_exporter<E>(exporter: E, config: &TelemetryConfig) -> Result<Self, TelemetryError>
    where
        E: SpanExporter + 'static,
    {
        let resource = build_resource(config)?;

        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(config.max_queue_size)
            .with_max_export_batch_size(config.max_export_batch_size)
            .with_scheduled_delay(config.scheduled_delay)
            .with_max_export_timeout(config.export_timeout)
            .build();
        let processor = BatchSpanProcessor::builder(exporter, runtime::Tokio)
            .with_batch_config(batch_config)
            .build();

        let inner = TracerProvider::builder()
            .with_span_processor(processor)
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource)
            .build();

        Ok(Self {
            inner,
            shut_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Tracer bound to this provider.
    pub fn tracer(&self) -> Tracer {
        self.inner.tracer(TRACER_NAME)
    }

    /// Push every buffered span to the exporter.
    ///
    /// Blocks the calling thread until the export task acknowledges.
    pub fn force_flush(&self) -> Result<(), TelemetryError> {
        for result in self.inner.force_flush() {
            result.map_err(|e| TelemetryError::Flush(e.to_string()))?;
        }
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Flush outstanding spans and stop the pipeline, waiting at most `timeout`.
    ///
    /// Only the first call does any work; later calls return `Ok(())`. A timeout is
    /// reported as [`TelemetryError::ShutdownTimeout`] and leaves the flush running in
    /// the background.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), TelemetryError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("trace provider already shut down");
            return Ok(());
        }

        // The SDK blocks on the export task, so keep it off the async workers.
        let inner = self.inner.clone();
        let flush = tokio::task::spawn_blocking(move || inner.shutdown());

        match tokio::time::timeout(timeout, flush).await {
            Ok(Ok(Ok(()))) => {
                info!("trace provider shut down");
                Ok(())
            }
            Ok(Ok(Err(e))) => Err(TelemetryError::Shutdown(e.to_string())),
            Ok(Err(join_error)) => Err(TelemetryError::Shutdown(join_error.to_string())),
            Err(_) => Err(TelemetryError::ShutdownTimeout(timeout)),
        }
    }
}

fn build_resource(config: &TelemetryConfig) -> Result<Resource, TelemetryError> {
    if config.service_name.trim().is_empty() {
        return Err(TelemetryError::Resource(
            "service name must not be empty".to_string(),
        ));
    }
    Ok(Resource::new(vec![
        KeyValue::new(SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(SERVICE_VERSION, config.service_version.clone()),
    ]))
}
