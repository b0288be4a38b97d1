//! Request span instrumentation.
//!
//! [`SpanInstrumentor::start_span`] opens a span and hands back a [`RequestSpan`] guard.
//! The guard closes the span exactly once: explicitly through [`RequestSpan::finish`],
//! or from `Drop` when the owning future is cancelled or unwinds.

use std::borrow::Cow;
use std::sync::Arc;

use opentelemetry::trace::{SpanContext, SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue, Value};
use opentelemetry_sdk::trace::Tracer;
use opentelemetry_semantic_conventions::attribute::ERROR_TYPE;
use tracing::debug;

use crate::context::LangfuseContext;

/// Starts request spans on an explicitly provided tracer.
#[derive(Clone)]
pub struct SpanInstrumentor {
    tracer: Tracer,
    trace_attributes: Arc<LangfuseContext>,
}

impl SpanInstrumentor {
    pub fn new(tracer: Tracer) -> Self {
        Self::with_trace_attributes(tracer, LangfuseContext::new())
    }

    /// Trace-level attributes are stamped on every span this instrumentor starts.
    pub fn with_trace_attributes(tracer: Tracer, trace_attributes: LangfuseContext) -> Self {
        Self {
            tracer,
            trace_attributes: Arc::new(trace_attributes),
        }
    }

    /// Start a server span as a child of the span active in `parent`, if any.
    pub fn start_span(&self, parent: &Context, name: &'static str) -> RequestSpan {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .start_with_context(&self.tracer, parent);
        let cx = parent.with_span(span);

        let mut request_span = RequestSpan {
            cx,
            attributes: Vec::new(),
            failure: None,
            finished: false,
        };
        request_span.set_attributes(self.trace_attributes.attributes());
        request_span
    }
}

/// Handle on an open request span.
///
/// Attributes are buffered here and written to the span when it closes, so repeated
/// writes to one key leave a single entry holding the last value.
pub struct RequestSpan {
    cx: Context,
    attributes: Vec<KeyValue>,
    failure: Option<Cow<'static, str>>,
    finished: bool,
}

impl RequestSpan {
    /// Context carrying this span; pass it to anything that should record child spans.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn span_context(&self) -> SpanContext {
        self.cx.span().span_context().clone()
    }

    /// Set attributes, stringifying every value. Last write wins per key.
    pub fn set_attributes<I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = KeyValue>,
    {
        for attribute in attributes {
            let value = Value::from(attribute.value.as_str().into_owned());
            match self.attributes.iter_mut().find(|kv| kv.key == attribute.key) {
                Some(existing) => existing.value = value,
                None => self.attributes.push(KeyValue::new(attribute.key, value)),
            }
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    /// Mark the span failed. The status becomes an error when the span closes.
    pub fn record_failure(&mut self, kind: &'static str, error: &(dyn std::error::Error + 'static)) {
        self.set_attributes([KeyValue::new(ERROR_TYPE, kind)]);
        self.cx.span().record_error(error);
        self.failure = Some(Cow::Owned(error.to_string()));
    }

    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Close the span with Ok status, or Error if a failure was recorded.
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let span = self.cx.span();
        for attribute in std::mem::take(&mut self.attributes) {
            span.set_attribute(attribute);
        }
        match self.failure.take() {
            Some(description) => span.set_status(Status::error(description)),
            None => span.set_status(Status::Ok),
        }
        span.end();
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let reason = if std::thread::panicking() {
            "request handler panicked"
        } else {
            "request cancelled"
        };
        debug!(reason, "closing request span on drop");
        self.set_attributes([KeyValue::new(ERROR_TYPE, "cancelled")]);
        self.failure = Some(Cow::Borrowed(reason));
        self.close();
    }
}
