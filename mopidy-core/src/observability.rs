//! Logging, tracing and metrics bootstrap
//!
//! The crates only emit `tracing` events and OpenTelemetry instruments; nothing
//! is exported until the application calls [`init_observability`]. That wires:
//!
//! 1. an OTLP/gRPC span exporter behind `tracing-opentelemetry` (if traces are on)
//! 2. an OTLP/gRPC meter provider with a periodic reader (if metrics are on)
//! 3. a `tracing-subscriber` registry with an `EnvFilter` and a JSON fmt layer
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter (e.g. "info", "mopidy_client=debug")
//!
//! ```rust,no_run
//! use mopidy_core::ObservabilityConfig;
//!
//! let config = ObservabilityConfig::new("living-room-remote")
//!     .with_metrics(false)
//!     .with_log_level("debug");
//! mopidy_core::init_observability(config).expect("observability");
//! ```

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How often metrics are pushed to the collector
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Providers installed by [`init_observability`], kept for shutdown
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();
static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

/// Observability configuration
///
/// Defaults: service name "mopidy-client", the crate version, the OTLP
/// endpoint from `OTEL_EXPORTER_OTLP_ENDPOINT` (or "http://localhost:4317"),
/// traces and metrics enabled, and the log filter from `RUST_LOG` (or "info").
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Identifies this client in telemetry backends
    pub service_name: String,
    pub service_version: String,
    /// gRPC endpoint of the OpenTelemetry collector
    pub otlp_endpoint: String,
    pub enable_traces: bool,
    pub enable_metrics: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "mopidy-client".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install exporters and the global tracing subscriber
///
/// Call once, early. A second call leaves the first subscriber in place and
/// returns an error instead of panicking.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    if TRACER_PROVIDER.set(provider.clone()).is_err() {
        tracing::warn!("Tracer provider already installed; keeping the first one for shutdown");
    }
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), BoxError> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    if METER_PROVIDER.set(provider.clone()).is_err() {
        tracing::warn!("Meter provider already installed; keeping the first one for shutdown");
    }
    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .json();

    // Option<Layer> is itself a layer, so a disabled tracer simply drops out.
    let telemetry_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush and stop the exporters installed by [`init_observability`]
///
/// Call once before exiting so batched spans and the last metrics reach the
/// collector. Without a prior init this only logs.
pub fn shutdown_observability() {
    tracing::info!("Shutting down observability");
    shutdown_providers(TRACER_PROVIDER.get(), METER_PROVIDER.get());
}

fn shutdown_providers(tracer: Option<&SdkTracerProvider>, meter: Option<&SdkMeterProvider>) {
    if let Some(provider) = tracer {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = meter {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "mopidy-client");
        assert_eq!(config.service_version, env!("CARGO_PKG_VERSION"));
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ObservabilityConfig::new("kitchen")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("1.2.3")
            .with_traces(false)
            .with_metrics(false);

        assert_eq!(config.service_name, "kitchen");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "1.2.3");
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_init_without_exporters_then_again() {
        let config = ObservabilityConfig::new("test-local")
            .with_traces(false)
            .with_metrics(false);

        // Only one global subscriber can exist per process; the second call must
        // fail gracefully rather than panic.
        let _ = init_observability(config.clone());
        assert!(init_observability(config).is_err());
    }

    #[test]
    fn test_shutdown_is_harmless() {
        shutdown_observability();
        shutdown_observability();
    }

    #[test]
    fn test_shutdown_stops_providers() {
        let tracer = SdkTracerProvider::builder().build();
        let meter = SdkMeterProvider::builder().build();

        shutdown_providers(Some(&tracer), Some(&meter));

        // Both were shut down above, so a second attempt is refused
        assert!(tracer.shutdown().is_err());
        assert!(meter.shutdown().is_err());
    }
}
