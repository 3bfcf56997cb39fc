// Telemetry module for structured logging, metrics, and tracing

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "umas-mission-scheduler";

pub const MISSIONS_SCHEDULED_TOTAL: &str = "missions_scheduled_total";
pub const PREPARATION_NOTIFICATIONS_TOTAL: &str = "preparation_notifications_total";
pub const MISSION_PUBLISH_FAILURES_TOTAL: &str = "mission_publish_failures_total";
pub const ENRICHMENT_FAILURES_TOTAL: &str = "enrichment_failures_total";
pub const SCHEDULER_LOCK_SKIPPED_TOTAL: &str = "scheduler_lock_skipped_total";
pub const SCHEDULER_JOB_DURATION_SECONDS: &str = "scheduler_job_duration_seconds";

/// Initialize structured logging with JSON formatting and trace context
///
/// `RUST_LOG` takes precedence over `log_level`. When `tracing_endpoint` is set,
/// spans are also exported over OTLP.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

/// OTLP span exporter tagged with the service name and version
#[tracing::instrument(skip_all)]
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");

    Ok(tracer)
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus exporter and describe the scheduler metrics
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        MISSIONS_SCHEDULED_TOTAL,
        "Mission execution events acknowledged by the broker"
    );
    describe_counter!(
        PREPARATION_NOTIFICATIONS_TOTAL,
        "Drone preparation notifications acknowledged by the broker"
    );
    describe_counter!(
        MISSION_PUBLISH_FAILURES_TOTAL,
        "Per-mission publish failures by error kind"
    );
    describe_counter!(
        ENRICHMENT_FAILURES_TOTAL,
        "Notifications skipped because a lookup failed"
    );
    describe_counter!(
        SCHEDULER_LOCK_SKIPPED_TOTAL,
        "Job triggers skipped because another instance held the lock"
    );
    describe_histogram!(
        SCHEDULER_JOB_DURATION_SECONDS,
        "Duration of scheduler job runs in seconds"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

#[inline]
pub fn record_missions_scheduled(count: usize) {
    counter!(MISSIONS_SCHEDULED_TOTAL).increment(count as u64);
}

#[inline]
pub fn record_notifications_published(count: usize) {
    counter!(PREPARATION_NOTIFICATIONS_TOTAL).increment(count as u64);
}

/// `kind` is the failure class, e.g. "transport" or "enrichment"
#[inline]
pub fn record_publish_failure(kind: &'static str) {
    counter!(MISSION_PUBLISH_FAILURES_TOTAL, "kind" => kind).increment(1);
}

#[inline]
pub fn record_enrichment_failure() {
    counter!(ENRICHMENT_FAILURES_TOTAL).increment(1);
}

#[inline]
pub fn record_lock_skipped(lock_name: &str) {
    counter!(SCHEDULER_LOCK_SKIPPED_TOTAL, "lock_name" => lock_name.to_string()).increment(1);
}

#[inline]
pub fn record_job_duration(job: &'static str, duration: Duration) {
    histogram!(SCHEDULER_JOB_DURATION_SECONDS, "job" => job).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_with_valid_level() {
        // A second initialization in the same process reports an error
        let result = init_logging("info", None);
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_metrics_recording_without_exporter() {
        record_missions_scheduled(3);
        record_notifications_published(2);
        record_publish_failure("transport");
        record_enrichment_failure();
        record_lock_skipped("scheduleMissions");
        record_job_duration("scheduleMissions", Duration::from_millis(250));
    }
}
