//! OpenTelemetry pipeline initialisation for crossway.
//!
//! Call [`init_tracing`] (or [`init_tracing_for_stop_sign`] when the stop
//! sign is known up front) once at process startup. Logs go to stderr so a
//! replay summary on stdout stays machine-readable.
//!
//! Exported spans carry the resource attributes from
//! [`resource_attributes`]: the scenario name and, when given, the stop sign
//! being handled, so traces from several intersections can be told apart in
//! the collector.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP collector base URL (e.g. `http://localhost:4318`). When set, `scenario_tick` spans are exported over OTLP/HTTP. |
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `CROSSWAY_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard until the replay finishes.
//! let _guard = crossway_runtime::telemetry::init_tracing_for_stop_sign("crossway", "stop_sign_7");
//! ```

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the scenario reported on every exported span.
pub const SCENARIO_NAME: &str = "stop_sign_unprotected";

pub const SCENARIO_KEY: &str = "crossway.scenario";
pub const STOP_SIGN_KEY: &str = "crossway.stop_sign_id";

/// Initialise the global `tracing` subscriber without a stop-sign attribute.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    init(service_name, None)
}

/// Initialise the global `tracing` subscriber, tagging exported spans with
/// `stop_sign_id`.
pub fn init_tracing_for_stop_sign(service_name: &str, stop_sign_id: &str) -> TracerProviderGuard {
    init(service_name, Some(stop_sign_id))
}

fn init(service_name: &str, stop_sign_id: Option<&str>) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let use_json = std::env::var("CROSSWAY_LOG_FORMAT").as_deref() == Ok("json");

    let provider = build_provider(service_name, stop_sign_id);
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("crossway")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(use_json.then(|| fmt::layer().with_writer(std::io::stderr).json()))
        .with((!use_json).then(|| fmt::layer().with_writer(std::io::stderr).compact()))
        .init();

    TracerProviderGuard(provider)
}

/// Resource attributes attached to the tracer provider, besides the service
/// name.
pub fn resource_attributes(stop_sign_id: Option<&str>) -> Vec<KeyValue> {
    let mut attrs = vec![KeyValue::new(SCENARIO_KEY, SCENARIO_NAME)];
    if let Some(id) = stop_sign_id {
        attrs.push(KeyValue::new(STOP_SIGN_KEY, id.to_string()));
    }
    attrs
}

/// Shuts down the OTel [`SdkTracerProvider`] on drop, flushing pending spans.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[crossway] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// `None` when `OTEL_EXPORTER_OTLP_ENDPOINT` is unset or the exporter cannot
/// be built; the caller then logs to the console only.
fn build_provider(service_name: &str, stop_sign_id: Option<&str>) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[crossway] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attributes(resource_attributes(stop_sign_id))
        .build();

    // The tick loop is synchronous, so export synchronously too.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_provider_returns_none_without_endpoint() {
        // SAFETY: no other test in this crate touches this variable.
        unsafe { std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT") };
        assert!(build_provider("crossway-test", Some("stop_sign_1")).is_none());
    }

    #[test]
    fn attributes_always_name_the_scenario() {
        let attrs = resource_attributes(None);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].key.as_str(), SCENARIO_KEY);
        assert_eq!(attrs[0].value.as_str(), SCENARIO_NAME);
    }

    #[test]
    fn attributes_carry_stop_sign_when_known() {
        let attrs = resource_attributes(Some("stop_sign_7"));
        let stop_sign = attrs.iter().find(|kv| kv.key.as_str() == STOP_SIGN_KEY).unwrap();
        assert_eq!(stop_sign.value.as_str(), "stop_sign_7");
    }

    #[test]
    fn guard_without_provider_drops_cleanly() {
        drop(TracerProviderGuard(None));
    }
}
