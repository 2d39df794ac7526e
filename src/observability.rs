//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels (pretty or JSON)
//! - Metrics collection and Prometheus export
//! - Distributed tracing export over OTLP
//! - A small HTTP endpoint serving `/metrics` and `/health/live`
//! - Span and metric helpers used by the pipeline stages

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;

use crate::model::ParseMethod;
use crate::observability_config::{ObservabilityConfig, SERVICE_NAME};

/// Initialize the complete observability stack with custom configuration
pub async fn init_observability_with_config(config: ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    // Tracing first so the remaining steps can log
    init_tracing_with_config(&config)?;

    let metrics_handle = init_metrics_with_config(&config)?;

    init_opentelemetry_tracing_with_config(&config)?;

    if let (Some(handle), true) = (metrics_handle, config.metrics_server_enabled) {
        start_metrics_server(handle, config.metrics_port).await?;
    }

    tracing::info!(
        service = SERVICE_NAME,
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        metrics_port = %config.metrics_port,
        metrics_server = %config.metrics_server_enabled,
        "Observability stack initialized successfully"
    );
    Ok(())
}

/// Install the global subscriber: env filter plus pretty or JSON output on stderr
fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("pantry_intake={}", config.log_level).parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    // LOG_FORMAT=pretty forces human-readable output outside development
    let pretty = config.is_development()
        || std::env::var("LOG_FORMAT").map(|f| f == "pretty").unwrap_or(false);

    let output = if pretty {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()?;

    tracing::debug!(log_level = %config.log_level, pretty, "Logging initialized");
    Ok(())
}

/// Install the Prometheus recorder when metrics export is enabled
fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enable_metrics_export {
        tracing::info!("Metrics export disabled");
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Metrics collection initialized");
    Ok(Some(handle))
}

/// Initialize OpenTelemetry trace export when an OTLP endpoint is configured
fn init_opentelemetry_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let Some(endpoint) = &config.otlp_endpoint else {
        tracing::info!("OpenTelemetry tracing disabled (no OTLP endpoint configured)");
        return Ok(());
    };

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()?;

    let sampler = if config.enable_trace_sampling {
        Sampler::TraceIdRatioBased(config.trace_sampling_ratio)
    } else {
        Sampler::AlwaysOn
    };

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(otlp_exporter)
        .with_sampler(sampler)
        .build();

    global::set_tracer_provider(tracer_provider);

    tracing::info!(
        otlp_endpoint = %endpoint,
        trace_sampling_enabled = %config.enable_trace_sampling,
        trace_sampling_ratio = %config.trace_sampling_ratio,
        "OpenTelemetry tracing initialized with OTLP export"
    );
    Ok(())
}

/// Route one scrape or probe request
async fn route(
    req: Request<Incoming>,
    metrics: PrometheusHandle,
) -> Result<Response<String>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut response = Response::new(metrics.render());
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        (&Method::GET, "/health/live") => Response::new("OK".to_string()),
        _ => {
            let mut response = Response::new("Not Found".to_string());
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    };
    Ok(response)
}

/// Serve `/metrics` and `/health/live` on a background task
async fn start_metrics_server(metrics: PrometheusHandle, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Metrics endpoint listening");

    tokio::spawn(async move {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "Metrics endpoint failed to accept a connection");
                    continue;
                }
            };
            let metrics = metrics.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| route(req, metrics.clone()));
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!(error = %e, "Metrics connection closed with an error");
                }
            });
        }
    });

    Ok(())
}

/// Create a span covering one batch run
pub fn batch_span(input_count: usize) -> tracing::Span {
    tracing::info_span!("batch_run", input_count = input_count, component = "batch")
}

/// Create a span for one input within a batch
pub fn input_span(index: usize, source: &str) -> tracing::Span {
    tracing::info_span!(
        "batch_input",
        input_index = index,
        source = source,
        component = "batch"
    )
}

/// Create a span for AI provider calls
pub fn ai_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ai_operation", operation = operation, component = "ai")
}

/// Create a span for database operations
pub fn db_span(operation: &str, table: &str) -> tracing::Span {
    tracing::info_span!(
        "db_operation",
        operation = operation,
        table = table,
        component = "database"
    )
}

/// Record one parse call and which strategy produced its items
pub fn record_parse_metrics(method: ParseMethod, duration: Duration, item_count: usize) {
    metrics::counter!("parse_operations_total", "method" => method.as_str()).increment(1);
    metrics::histogram!("parse_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("parse_items_per_input").record(item_count as f64);
}

/// Record the outcome of one AI provider request
pub fn record_ai_request(result: &'static str, duration: Duration) {
    metrics::counter!("ai_requests_total", "result" => result).increment(1);
    metrics::histogram!("ai_request_duration_seconds").record(duration.as_secs_f64());
}

/// Record one item merge
pub fn record_merge_metrics(success: bool) {
    metrics::counter!(
        "merge_operations_total",
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record the outcome of one input inside a batch
pub fn record_batch_input(result: &'static str) {
    metrics::counter!("batch_inputs_total", "result" => result).increment(1);
}

/// Record a finished batch run
pub fn record_batch_run(status: &'static str, duration: Duration) {
    metrics::counter!("batch_runs_total", "status" => status).increment(1);
    metrics::histogram!("batch_duration_seconds").record(duration.as_secs_f64());
}

/// Record database operation metrics
pub fn record_db_metrics(operation: &str, duration: Duration) {
    let operation = operation.to_string();
    metrics::counter!("db_operations_total", "operation" => operation).increment(1);
    metrics::histogram!("db_operation_duration_seconds").record(duration.as_secs_f64());
}

/// Update circuit breaker state metric
pub fn update_circuit_breaker_state(is_open: bool) {
    metrics::gauge!("circuit_breaker_state").set(if is_open { 1.0 } else { 0.0 });
}
