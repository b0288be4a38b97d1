//! Shared helpers for unit tests: span exporters that record what they receive and
//! fake language models that count their invocations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use opentelemetry::trace::SpanId;
use opentelemetry::Context;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::Resource;

use crate::config::TelemetryConfig;
use crate::error::ProviderError;
use crate::llm::{LanguageModel, LanguageModelFactory};
use crate::telemetry::TraceProvider;

/// Exporter that keeps every span it is handed, plus the resource it was given.
#[derive(Clone, Debug, Default)]
pub struct RecordingExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    resource: Arc<Mutex<Option<Resource>>>,
}

impl RecordingExporter {
    pub fn finished_spans(&self) -> Vec<SpanData> {
        self.spans.lock().unwrap().clone()
    }

    pub fn resource(&self) -> Option<Resource> {
        self.resource.lock().unwrap().clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanData> {
        self.finished_spans()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }
}

impl SpanExporter for RecordingExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        self.spans.lock().unwrap().extend(batch);
        Box::pin(std::future::ready(Ok(())))
    }

    fn set_resource(&mut self, resource: &Resource) {
        *self.resource.lock().unwrap() = Some(resource.clone());
    }
}

/// Exporter whose exports take `delay` to complete.
#[derive(Debug)]
pub struct StallingExporter {
    delay: Duration,
}

impl StallingExporter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl SpanExporter for StallingExporter {
    fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(())
        })
    }
}

/// Provider over a [`RecordingExporter`] with a schedule delay long enough that spans
/// only leave the buffer on an explicit flush.
pub fn recording_provider() -> (TraceProvider, RecordingExporter) {
    let exporter = RecordingExporter::default();
    let config = TelemetryConfig {
        scheduled_delay: Duration::from_secs(60),
        ..TelemetryConfig::default()
    };
    let provider = TraceProvider::with_exporter(exporter.clone(), &config).unwrap();
    (provider, exporter)
}

/// Flush from a blocking thread so the export task keeps its worker.
pub async fn flush(provider: &TraceProvider) {
    let provider = provider.clone();
    tokio::task::spawn_blocking(move || provider.force_flush())
        .await
        .unwrap()
        .unwrap();
}

pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

pub fn has_attribute(span: &SpanData, key: &str) -> bool {
    attribute(span, key).is_some()
}

pub fn span_ids(spans: &[SpanData]) -> Vec<SpanId> {
    spans.iter().map(|s| s.span_context.span_id()).collect()
}

/// What a [`FakeModel`] answers with.
#[derive(Clone, Debug)]
pub enum FakeReply {
    Text(String),
    Failure,
    /// Answers `reply-{n}` for the n-th call, after a short call-dependent delay.
    Numbered,
    /// Never answers; used to simulate a request cancelled mid-call.
    Hang,
}

/// Factory handing out a shared [`FakeModel`], counting connects and calls.
#[derive(Clone)]
pub struct FakeModelFactory {
    reply: FakeReply,
    fail_connect: bool,
    pub connects: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub seen_api_keys: Arc<Mutex<Vec<String>>>,
}

impl FakeModelFactory {
    pub fn new(reply: FakeReply) -> Self {
        Self {
            reply,
            fail_connect: false,
            connects: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
            seen_api_keys: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(FakeReply::Text(text.to_string()))
    }

    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Self::replying("unused")
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LanguageModelFactory for FakeModelFactory {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn LanguageModel>, ProviderError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen_api_keys.lock().unwrap().push(api_key.to_string());
        if self.fail_connect {
            return Err(ProviderError::Client("no client for you".to_string()));
        }
        Ok(Arc::new(FakeModel {
            reply: self.reply.clone(),
            calls: self.calls.clone(),
        }))
    }
}

pub struct FakeModel {
    reply: FakeReply,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn generate(
        &self,
        _cx: &Context,
        _model: &str,
        _prompt: &str,
    ) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            FakeReply::Text(text) => Ok(text.clone()),
            FakeReply::Numbered => {
                tokio::time::sleep(Duration::from_millis((call % 7) as u64)).await;
                Ok(format!("reply-{}", call))
            }
            FakeReply::Failure => Err(ProviderError::Status {
                status: 503,
                body: "upstream unavailable".to_string(),
            }),
            FakeReply::Hang => std::future::pending::<Result<String, ProviderError>>().await,
        }
    }
}
