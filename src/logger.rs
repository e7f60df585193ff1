use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::Result;
use flow_message::{LogLevel, Response, ResponseKind};
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, MetricExporter, Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::{logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

pub const SERVICE_NAME: &str = "screenflow";
pub const LOG_FILE: &str = "screenflow.log";
pub const REQUEST_FILE: &str = "requests.log";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: LogLevel,
    /// Write rolling log files here instead of stdout.
    pub log_dir: Option<PathBuf>,
    /// OTLP/HTTP collector base URL; takes precedence over `log_dir`.
    pub otel_endpoint: Option<String>,
}

impl LogConfig {
    pub fn new(log_level: LogLevel, log_dir: Option<PathBuf>, otel_endpoint: Option<String>) -> Self {
        Self {
            log_level,
            log_dir,
            otel_endpoint,
        }
    }
}

/// Keeps exporters alive; flushes them when dropped.
#[derive(Default)]
pub struct TelemetryGuard {
    logger_provider: Option<SdkLoggerProvider>,
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.logger_provider.take() {
            let _ = provider.shutdown();
        }
        if let Some(provider) = self.tracer_provider.take() {
            let _ = provider.shutdown();
        }
        if let Some(provider) = self.meter_provider.take() {
            let _ = provider.shutdown();
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// With an OTLP endpoint, logs, spans and metrics are exported there and
/// echoed to stdout. With a log directory, text logs and a JSON line per
/// request (events with `target: "request"`) go to daily rolling files.
/// Otherwise everything goes to stdout. `RUST_LOG` overrides the level.
pub fn init_tracing(config: &LogConfig) -> Result<TelemetryGuard> {
    let level = config.log_level.as_directive();
    if let Some(endpoint) = &config.otel_endpoint {
        init_otlp(level, endpoint)
    } else if let Some(dir) = &config.log_dir {
        init_files(level, dir)
    } else {
        Registry::default()
            .with(env_filter(level))
            .with(fmt::layer().with_target(false))
            .try_init()?;
        Ok(TelemetryGuard::default())
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn init_files(level: &str, dir: &Path) -> Result<TelemetryGuard> {
    std::fs::create_dir_all(dir)?;

    let txt_layer = fmt::layer()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE))
        .with_ansi(false)
        .with_filter(env_filter(level));

    let json_layer = fmt::layer()
        .json()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, dir, REQUEST_FILE))
        .with_target(true)
        .with_filter(EnvFilter::new("request=info"));

    Registry::default().with(txt_layer).with(json_layer).try_init()?;
    info!("logging to {}", dir.display());
    Ok(TelemetryGuard::default())
}

fn init_otlp(level: &str, endpoint: &str) -> Result<TelemetryGuard> {
    let endpoint = endpoint.trim_end_matches('/');
    let logger_provider = init_logs(&format!("{endpoint}/v1/logs"))?;
    let tracer_provider = init_traces(&format!("{endpoint}/v1/traces"))?;
    let meter_provider = init_metrics(&format!("{endpoint}/v1/metrics"))?;

    let otel_layer = OpenTelemetryTracingBridge::new(&logger_provider).with_filter(
        EnvFilter::new(level)
            .add_directive("hyper=off".parse()?)
            .add_directive("tonic=off".parse()?)
            .add_directive("h2=off".parse()?)
            .add_directive("reqwest=off".parse()?),
    );
    let fmt_layer = fmt::layer().with_thread_names(true).with_filter(env_filter(level));

    Registry::default().with(otel_layer).with(fmt_layer).try_init()?;

    global::set_tracer_provider(tracer_provider.clone());
    global::set_meter_provider(meter_provider.clone());
    info!(endpoint, "exporting telemetry over OTLP");

    Ok(TelemetryGuard {
        logger_provider: Some(logger_provider),
        tracer_provider: Some(tracer_provider),
        meter_provider: Some(meter_provider),
    })
}

static RESOURCE: OnceLock<Resource> = OnceLock::new();

fn resource() -> Resource {
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_logs(endpoint: &str) -> Result<SdkLoggerProvider> {
    let exporter = LogExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()?;
    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource())
        .build())
}

fn init_traces(endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()?;
    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource())
        .build())
}

fn init_metrics(endpoint: &str) -> Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .build()?;
    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(resource())
        .build())
}

/// Per-request counters and latency, recorded on the global meter.
///
/// Without an installed meter provider the instruments are no-ops.
#[derive(Clone)]
pub struct RequestMetrics {
    requests_started: Counter<u64>,
    requests_succeeded: Counter<u64>,
    requests_failed: Counter<u64>,
    prompts: Counter<u64>,
    terminations: Counter<u64>,
    request_latency_ms: Histogram<f64>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetrics {
    pub fn new() -> Self {
        let meter = global::meter(SERVICE_NAME);
        Self {
            requests_started: meter
                .u64_counter("requests_started")
                .with_description("Total requests started")
                .build(),
            requests_succeeded: meter.u64_counter("requests_succeeded").build(),
            requests_failed: meter.u64_counter("requests_failed").build(),
            prompts: meter
                .u64_counter("prompts")
                .with_description("Responses that expect more input")
                .build(),
            terminations: meter
                .u64_counter("terminations")
                .with_description("Responses that ended a conversation")
                .build(),
            request_latency_ms: meter
                .f64_histogram("request_latency_ms")
                .with_description("Latency per request in ms")
                .with_unit("ms")
                .build(),
        }
    }

    pub fn record_response(&self, response: &Response) {
        match response.kind {
            ResponseKind::Prompt => self.prompts.add(1, &[]),
            ResponseKind::Terminal => self.terminations.add(1, &[]),
        }
    }

    /// Runs `handler`, recording its outcome and latency, and emits one
    /// `target: "request"` event for the JSON request log.
    pub async fn instrument_request<F, Fut, T, E>(&self, name: &str, handler: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.requests_started.add(1, &[]);
        let start = Instant::now();

        let result = handler().await;

        let elapsed = start.elapsed().as_secs_f64() * 1_000.0;
        self.request_latency_ms.record(elapsed, &[]);

        match &result {
            Ok(_) => {
                self.requests_succeeded.add(1, &[]);
                info!("request `{}` succeeded in {:.2} ms", name, elapsed);
            }
            Err(err) => {
                self.requests_failed.add(1, &[]);
                error!(error = %err, "request `{}` failed in {:.2} ms", name, elapsed);
            }
        }

        tracing::event!(
            target: "request",
            tracing::Level::INFO,
            request = name,
            latency_ms = elapsed,
            status = if result.is_ok() { "ok" } else { "error" },
        );

        result
    }
}
