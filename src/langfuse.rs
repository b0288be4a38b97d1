//! Langfuse integration utilities

use base64::{engine::general_purpose::STANDARD, Engine};

/// Path Langfuse serves its OTLP/HTTP ingestion API under.
pub const OTEL_API_PATH: &str = "/api/public/otel";

/// Path the OTLP/HTTP exporter posts traces to, relative to a base endpoint.
pub const OTLP_TRACES_PATH: &str = "/v1/traces";

/// Builds a Langfuse authentication header value from public and secret keys.
///
/// This function concatenates the public and secret keys with a colon separator,
/// encodes them in base64, and returns the complete "Basic {auth}" string.
///
/// # Example
///
/// ```rust
/// use langfuse_chat_gateway::build_langfuse_auth_header;
///
/// let auth = build_langfuse_auth_header("pk-lf-1234567890", "sk-lf-1234567890");
/// assert!(auth.starts_with("Basic "));
/// ```
pub fn build_langfuse_auth_header(public_key: &str, secret_key: &str) -> String {
    let auth_string = format!("{}:{}", public_key, secret_key);
    let encoded = STANDARD.encode(auth_string.as_bytes());
    format!("Basic {}", encoded)
}

/// Builds the Langfuse OTLP endpoint URL by appending the API path.
///
/// # Example
///
/// ```rust
/// use langfuse_chat_gateway::build_otlp_endpoint;
///
/// let endpoint = build_otlp_endpoint("https://cloud.langfuse.com");
/// assert_eq!(endpoint, "https://cloud.langfuse.com/api/public/otel");
/// ```
pub fn build_otlp_endpoint(base_url: &str) -> String {
    let url = base_url.trim_end_matches('/');
    format!("{}{}", url, OTEL_API_PATH)
}

/// Appends the OTLP traces path to a base OTLP endpoint.
///
/// The HTTP exporter uses an explicitly configured endpoint verbatim, so the
/// signal path has to be added here.
pub fn build_traces_endpoint(otlp_endpoint: &str) -> String {
    let url = otlp_endpoint.trim_end_matches('/');
    format!("{}{}", url, OTLP_TRACES_PATH)
}
