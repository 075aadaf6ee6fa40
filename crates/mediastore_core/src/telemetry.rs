//! Logging and OpenTelemetry initialization.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use opentelemetry_stdout::SpanExporter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(level: &str) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?)
}

fn fmt_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .boxed()
    }
}

/// Install a `tracing` subscriber writing human-readable or JSON logs.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Errors
///
/// Returns error if the filter is invalid or a subscriber is already set.
pub fn init_logging(level: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter(level)?)
        .with(fmt_layer(json))
        .try_init()?;
    Ok(())
}

/// Install logging plus an OpenTelemetry layer exporting spans to stdout.
///
/// The returned provider flushes on drop; keep it alive for the life of the
/// process.
///
/// # Errors
///
/// Returns error if the filter is invalid or a subscriber is already set.
pub fn init_telemetry(
    service_name: &str,
    level: &str,
    json: bool,
) -> Result<SdkTracerProvider, Box<dyn std::error::Error>> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(SpanExporter::default())
        .with_resource(resource)
        .build();

    let tracer = provider.tracer(service_name.to_string());
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter(level)?)
        .with(fmt_layer(json))
        .with(otel_layer)
        .try_init()?;

    Ok(provider)
}
