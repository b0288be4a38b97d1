//! Gateway configuration.
//!
//! The environment is read exactly once, by [`GatewayConfig::from_env`]. Every component
//! receives the values it needs from the resulting struct and never looks at process
//! state itself.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::context::LangfuseContext;
use crate::error::ConfigError;
use crate::langfuse::{build_langfuse_auth_header, build_otlp_endpoint, build_traces_endpoint};

pub const SERVICE_NAME: &str = "langfuse-chat-gateway";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration of the whole gateway process.
#[derive(Clone)]
pub struct GatewayConfig {
    /// OpenAI API key. Its absence is reported per request, not at startup.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub provider_timeout: Duration,
    pub port: u16,
    pub telemetry: TelemetryConfig,
    pub langfuse: LangfuseContext,
}

// Hand-written so the API key never ends up in logs.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("provider_timeout", &self.provider_timeout)
            .field("port", &self.port)
            .field("telemetry", &self.telemetry)
            .field("langfuse", &self.langfuse)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider_timeout: Duration::from_secs(60),
            port: DEFAULT_PORT,
            telemetry: TelemetryConfig::default(),
            langfuse: LangfuseContext::new(),
        }
    }
}

/// Trace provider configuration: resource, exporter and batching policy.
///
/// Sampling is not configurable; every span is recorded.
#[derive(Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    /// Full OTLP/HTTP traces URL. `None` leaves the exporter on its default.
    pub traces_endpoint: Option<String>,
    pub headers: HashMap<String, String>,
    pub export_timeout: Duration,
    pub max_queue_size: usize,
    pub max_export_batch_size: usize,
    pub scheduled_delay: Duration,
    /// How long process exit waits for the final flush.
    pub shutdown_timeout: Duration,
}

impl fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header_names: Vec<&String> = self.headers.keys().collect();
        header_names.sort();
        f.debug_struct("TelemetryConfig")
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .field("traces_endpoint", &self.traces_endpoint)
            .field("headers", &header_names)
            .field("export_timeout", &self.export_timeout)
            .field("max_queue_size", &self.max_queue_size)
            .field("max_export_batch_size", &self.max_export_batch_size)
            .field("scheduled_delay", &self.scheduled_delay)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            service_version: SERVICE_VERSION.to_string(),
            traces_endpoint: None,
            headers: HashMap::new(),
            export_timeout: Duration::from_secs(10),
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay: Duration::from_millis(5000),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl GatewayConfig {
    /// Populate the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Populate the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = GatewayConfig::default();
        let telemetry_defaults = TelemetryConfig::default();

        let telemetry = TelemetryConfig {
            traces_endpoint: resolve_traces_endpoint(&var),
            headers: resolve_export_headers(&var),
            export_timeout: parse_millis(&var, "OTEL_EXPORTER_OTLP_TIMEOUT")?
                .unwrap_or(telemetry_defaults.export_timeout),
            max_queue_size: parse(&var, "OTEL_BSP_MAX_QUEUE_SIZE")?
                .unwrap_or(telemetry_defaults.max_queue_size),
            max_export_batch_size: parse(&var, "OTEL_BSP_MAX_EXPORT_BATCH_SIZE")?
                .unwrap_or(telemetry_defaults.max_export_batch_size),
            scheduled_delay: parse_millis(&var, "OTEL_BSP_SCHEDULE_DELAY")?
                .unwrap_or(telemetry_defaults.scheduled_delay),
            ..telemetry_defaults
        };

        let mut langfuse = LangfuseContext::builder();
        if let Some(environment) = var("LANGFUSE_TRACING_ENVIRONMENT") {
            langfuse = langfuse.environment(environment);
        }
        if let Some(release) = var("LANGFUSE_RELEASE") {
            langfuse = langfuse.release(release);
        }

        Ok(Self {
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            model: var("OPENAI_MODEL").unwrap_or(defaults.model),
            provider_timeout: parse(&var, "OPENAI_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            port: parse(&var, "PORT")?.unwrap_or(defaults.port),
            telemetry,
            langfuse: langfuse.build(),
        })
    }
}

/// Resolve the traces URL the same way the OTLP exporter does, with Langfuse as the
/// last fallback before the exporter's own default.
fn resolve_traces_endpoint(var: &impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(endpoint) = var("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT") {
        return Some(endpoint);
    }
    if let Some(endpoint) = var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        return Some(build_traces_endpoint(&endpoint));
    }
    var("LANGFUSE_HOST").map(|host| build_traces_endpoint(&build_otlp_endpoint(&host)))
}

fn resolve_export_headers(var: &impl Fn(&str) -> Option<String>) -> HashMap<String, String> {
    let mut headers = var("OTEL_EXPORTER_OTLP_HEADERS")
        .map(|raw| parse_headers(&raw))
        .unwrap_or_default();

    if let (Some(public_key), Some(secret_key)) =
        (var("LANGFUSE_PUBLIC_KEY"), var("LANGFUSE_SECRET_KEY"))
    {
        headers.insert(
            "Authorization".to_string(),
            build_langfuse_auth_header(&public_key, &secret_key),
        );
    }
    headers
}

/// Parse the `k1=v1,k2=v2` header list format used by `OTEL_EXPORTER_OTLP_HEADERS`.
/// Malformed pairs are skipped.
fn parse_headers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

fn parse_millis(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse::<u64>(var, key)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert!(config.telemetry.traces_endpoint.is_none());
        assert!(config.telemetry.headers.is_empty());
        assert_eq!(config.telemetry.service_name, "langfuse-chat-gateway");
        assert!(config.langfuse.is_empty());
    }

    #[test]
    fn test_empty_api_key_is_unset() {
        let config = config_from(&[("OPENAI_API_KEY", "")]).unwrap();
        assert!(config.openai_api_key.is_none());

        let config = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_port_override_and_invalid_port() {
        let config = config_from(&[("PORT", "9000")]).unwrap();
        assert_eq!(config.port, 9000);

        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_traces_endpoint_precedence() {
        let config = config_from(&[
            ("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT", "http://collector:4318/custom"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://other:4318"),
            ("LANGFUSE_HOST", "https://cloud.langfuse.com"),
        ])
        .unwrap();
        assert_eq!(
            config.telemetry.traces_endpoint.as_deref(),
            Some("http://collector:4318/custom")
        );

        let config = config_from(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://other:4318/"),
            ("LANGFUSE_HOST", "https://cloud.langfuse.com"),
        ])
        .unwrap();
        assert_eq!(
            config.telemetry.traces_endpoint.as_deref(),
            Some("http://other:4318/v1/traces")
        );

        let config = config_from(&[("LANGFUSE_HOST", "https://cloud.langfuse.com")]).unwrap();
        assert_eq!(
            config.telemetry.traces_endpoint.as_deref(),
            Some("https://cloud.langfuse.com/api/public/otel/v1/traces")
        );
    }

    #[test]
    fn test_langfuse_keys_add_authorization_header() {
        let config = config_from(&[
            ("OTEL_EXPORTER_OTLP_HEADERS", "x-tenant=demo, bad-pair ,x-env=dev"),
            ("LANGFUSE_PUBLIC_KEY", "pk-lf-test"),
            ("LANGFUSE_SECRET_KEY", "sk-lf-secret"),
        ])
        .unwrap();

        let headers = &config.telemetry.headers;
        assert_eq!(headers.get("x-tenant").map(String::as_str), Some("demo"));
        assert_eq!(headers.get("x-env").map(String::as_str), Some("dev"));
        assert_eq!(
            headers.get("Authorization"),
            Some(&build_langfuse_auth_header("pk-lf-test", "sk-lf-secret"))
        );
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_missing_secret_key_skips_authorization() {
        let config = config_from(&[("LANGFUSE_PUBLIC_KEY", "pk-lf-test")]).unwrap();
        assert!(!config.telemetry.headers.contains_key("Authorization"));
    }

    #[test]
    fn test_batching_overrides() {
        let config = config_from(&[
            ("OTEL_BSP_MAX_EXPORT_BATCH_SIZE", "64"),
            ("OTEL_BSP_SCHEDULE_DELAY", "250"),
            ("OTEL_BSP_MAX_QUEUE_SIZE", "128"),
        ])
        .unwrap();
        assert_eq!(config.telemetry.max_export_batch_size, 64);
        assert_eq!(config.telemetry.max_queue_size, 128);
        assert_eq!(config.telemetry.scheduled_delay, Duration::from_millis(250));

        assert!(config_from(&[("OTEL_BSP_SCHEDULE_DELAY", "-1")]).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-very-secret"),
            ("LANGFUSE_PUBLIC_KEY", "pk-lf-test"),
            ("LANGFUSE_SECRET_KEY", "sk-lf-secret"),
        ])
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(!rendered.contains(&build_langfuse_auth_header("pk-lf-test", "sk-lf-secret")));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_langfuse_trace_attributes() {
        let config = config_from(&[
            ("LANGFUSE_TRACING_ENVIRONMENT", "production"),
            ("LANGFUSE_RELEASE", "2024.10"),
        ])
        .unwrap();
        assert_eq!(
            config.langfuse.get_attribute("langfuse.environment"),
            Some("production")
        );
        assert_eq!(config.langfuse.get_attribute("langfuse.release"), Some("2024.10"));
    }
}
