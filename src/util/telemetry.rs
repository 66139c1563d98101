//! Tracing subscriber setup, with optional OpenTelemetry export.
//!
//! When any `OTEL_EXPORTER_OTLP_*` variable is present, spans and metrics are
//! exported over OTLP (HTTP or gRPC, per `OTEL_EXPORTER_OTLP_PROTOCOL`) in
//! addition to local logging. Otherwise only a local `fmt` layer is installed,
//! filtered by `RUST_LOG` (default `info`).

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use std::env;
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Telemetry protocol to use for OTLP export
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    HTTP,
    GRPC,
}

impl TelemetryProtocol {
    /// Determines telemetry protocol from environment variables if OTEL is configured
    fn from_env() -> Option<Self> {
        let is_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        if !is_enabled {
            return None;
        }
        let protocol = env::var("OTEL_EXPORTER_OTLP_PROTOCOL").ok();
        Some(Self::parse(protocol.as_deref()))
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("grpc") => TelemetryProtocol::GRPC,
            _ => TelemetryProtocol::HTTP,
        }
    }
}

/// Builder for the process-wide tracing setup.
#[derive(Debug, Clone)]
pub struct Telemetry {
    name: String,
    version: String,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Service name reported to the OTLP collector.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Service version reported to the OTLP collector.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Installs the global tracing subscriber.
    ///
    /// Falls back to local logging if the OTLP exporters cannot be built.
    pub fn register(self) -> TelemetryProviders {
        let Some(protocol) = TelemetryProtocol::from_env() else {
            init_local();
            tracing::info!("OpenTelemetry is not enabled");
            return TelemetryProviders::default();
        };
        match self.init_otel(protocol) {
            Ok(providers) => {
                tracing::info!(
                    "OpenTelemetry tracing and metrics exporter is enabled via {:?}",
                    protocol
                );
                providers
            }
            Err(err) => {
                init_local();
                tracing::warn!(error = %err, "Failed to set up OpenTelemetry, using local logging");
                TelemetryProviders::default()
            }
        }
    }

    fn init_otel(&self, protocol: TelemetryProtocol) -> Result<TelemetryProviders, BoxError> {
        let tracer_provider = self.init_tracer_provider(protocol)?;
        let meter_provider = self.init_meter_provider(protocol)?;
        let tracer = tracer_provider.tracer(self.name.clone());

        // Global level filter keeps the exporter's own network spans out of the
        // OpenTelemetry layer.
        tracing_subscriber::registry()
            .with(tracing_subscriber::filter::LevelFilter::INFO)
            .with(tracing_subscriber::fmt::layer())
            .with(MetricsLayer::new(meter_provider.clone()))
            .with(OpenTelemetryLayer::new(tracer))
            .init();

        Ok(TelemetryProviders {
            tracer_provider: Some(tracer_provider),
            meter_provider: Some(meter_provider),
        })
    }

    /// Semantic OpenTelemetry `Resource` describing this service
    fn resource(&self) -> Resource {
        let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
        Resource::builder()
            .with_service_name(self.name.clone())
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, self.version.clone()),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    fn init_meter_provider(&self, protocol: TelemetryProtocol) -> Result<SdkMeterProvider, BoxError> {
        let exporter = opentelemetry_otlp::MetricExporter::builder();
        let exporter = match protocol {
            TelemetryProtocol::HTTP => exporter
                .with_http()
                .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
                .build()?,
            TelemetryProtocol::GRPC => exporter
                .with_tonic()
                .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
                .build()?,
        };

        let reader = PeriodicReader::builder(exporter)
            .with_interval(Duration::from_secs(30))
            .build();
        let stdout_reader =
            PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();

        let meter_provider = MeterProviderBuilder::default()
            .with_resource(self.resource())
            .with_reader(reader)
            .with_reader(stdout_reader)
            .build();
        global::set_meter_provider(meter_provider.clone());
        Ok(meter_provider)
    }

    fn init_tracer_provider(&self, protocol: TelemetryProtocol) -> Result<SdkTracerProvider, BoxError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder();
        let exporter = match protocol {
            TelemetryProtocol::HTTP => exporter.with_http().build()?,
            TelemetryProtocol::GRPC => exporter.with_tonic().build()?,
        };

        Ok(SdkTracerProvider::builder()
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                1.0,
            ))))
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(self.resource())
            .with_batch_exporter(exporter)
            .build())
    }
}

fn init_local() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Installed telemetry providers, flushed on drop.
#[derive(Default)]
pub struct TelemetryProviders {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryProviders {
    /// Whether spans and metrics are exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Request tracing layer for the HTTP router.
    pub fn http_tracing(&self) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
        TraceLayer::new_for_http()
    }
}

impl Drop for TelemetryProviders {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.as_ref() {
            if let Err(err) = tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
        if let Some(meter_provider) = self.meter_provider.as_ref() {
            if let Err(err) = meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
