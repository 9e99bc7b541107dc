//! Tracing setup for the binaries.
//!
//! By default events go to stdout through `tracing_subscriber::fmt`, filtered by `RUST_LOG` (default `info`).
//! With `--tracing-jaeger` spans are exported over OTLP instead, tagged with the role of the process.
use anyhow::{anyhow, Context};
use opentelemetry::sdk::trace::BatchConfig;
use opentelemetry::{global, KeyValue};

use opentelemetry::sdk::propagation::TraceContextPropagator;
use opentelemetry::sdk::{trace, Resource};
use opentelemetry_otlp::WithExportConfig;
use tracing::level_filters::LevelFilter;
use tracing_bunyan_formatter::JsonStorageLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

const SERVICE_NAME: &str = "bucketdb";

/// # Errors
/// if a global subscriber is already installed
pub fn initialize_fmt_subscriber() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("unable to install fmt subscriber: {}", e))
}

/// `role` ends up in the `service.name` resource, e.g. `bucketdb-directory` or `bucketdb-bucket-0`
pub fn initialize_jaeger_subscriber(exporter_endpoint: &str, role: &str) -> anyhow::Result<()> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(exporter_endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config().with_resource(Resource::new(vec![KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                format!("{}-{}", SERVICE_NAME, role),
            )])),
        )
        .with_batch_config(BatchConfig::default().with_max_queue_size(1024 * 1024))
        .install_batch(opentelemetry::runtime::Tokio)
        .context("unable to initialize the OTLP tracer")?;

    let subscriber = Registry::default();
    let tracing_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    global::set_text_map_propagator(TraceContextPropagator::new());

    subscriber
        .with(LevelFilter::INFO)
        .with(tracing_layer)
        .with(JsonStorageLayer)
        .try_init()?;

    Ok(())
}

/// Flushes pending spans. No-op when the OTLP pipeline isn't installed.
pub fn shutdown_tracer_provider() {
    global::shutdown_tracer_provider();
}
