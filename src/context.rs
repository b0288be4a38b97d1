//! Trace-level Langfuse attributes applied to every request span

use crate::attributes::LangfuseAttributes;
use opentelemetry::KeyValue;

/// Immutable set of trace-level attributes, built once at startup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LangfuseContext {
    attributes: Vec<(String, String)>,
}

impl LangfuseContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> LangfuseContextBuilder {
        LangfuseContextBuilder::new()
    }

    /// Get all attributes as key-value pairs, in insertion order
    pub fn attributes(&self) -> Vec<KeyValue> {
        self.attributes
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect()
    }

    /// Get a specific attribute value
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Copy of this context with `langfuse.trace.name` set to `name`
    pub fn with_trace_name(&self, name: impl Into<String>) -> Self {
        let mut context = self.clone();
        context.set(LangfuseAttributes::TRACE_NAME, name.into());
        context
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn set(&mut self, key: &str, value: String) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }
}

/// Builder pattern for fluent API
#[derive(Default)]
pub struct LangfuseContextBuilder {
    context: LangfuseContext,
}

impl LangfuseContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace_name(mut self, name: impl Into<String>) -> Self {
        self.context.set(LangfuseAttributes::TRACE_NAME, name.into());
        self
    }

    /// Deployment environment shown in Langfuse (e.g. "production")
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.context
            .set(LangfuseAttributes::ENVIRONMENT, environment.into());
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.context.set(LangfuseAttributes::RELEASE, release.into());
        self
    }

    pub fn build(self) -> LangfuseContext {
        self.context
    }
}
