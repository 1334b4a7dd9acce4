//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by HTTP status
//! - `gateway_response_time_seconds` (histogram): latency of 200 responses
//! - `gateway_method_duration_seconds` (histogram): latency of 200 responses by method
//! - `gateway_backend_duration_seconds` (histogram): time spent in the backend call
//!
//! # Design Decisions
//! - Handlers talk to the `RequestMetrics` trait, not to the recorder
//! - Without an installed recorder every update is a no-op
//! - Method labels come from client paths, so their number is capped

use std::net::SocketAddr;
use std::time::Duration;

use dashmap::DashSet;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Distinct `method` label values before new methods share one label.
const MAX_METHOD_LABELS: usize = 1_000;

/// Label for methods seen after the cap is reached.
pub const OTHER_METHOD_LABEL: &str = "other";

/// Sink for per-request observations.
pub trait RequestMetrics: Send + Sync {
    /// One finished HTTP request.
    fn record_request(&self, status: u16, elapsed: Duration, method: &str);

    /// One finished backend call, excluding HTTP handling.
    fn record_backend_call(&self, method: &str, elapsed: Duration);
}

/// Records through the `metrics` facade into the Prometheus exporter.
#[derive(Debug, Default)]
pub struct PrometheusMetrics {
    methods: DashSet<String>,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn method_label(&self, method: &str) -> String {
        if self.methods.contains(method) {
            return method.to_string();
        }
        if self.methods.len() < MAX_METHOD_LABELS {
            self.methods.insert(method.to_string());
            return method.to_string();
        }
        OTHER_METHOD_LABEL.to_string()
    }
}

impl RequestMetrics for PrometheusMetrics {
    fn record_request(&self, status: u16, elapsed: Duration, method: &str) {
        metrics::counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
        if status == 200 {
            metrics::histogram!("gateway_response_time_seconds").record(elapsed.as_secs_f64());
            metrics::histogram!("gateway_method_duration_seconds", "method" => self.method_label(method))
                .record(elapsed.as_secs_f64());
        }
    }

    fn record_backend_call(&self, method: &str, elapsed: Duration) {
        metrics::histogram!("gateway_backend_duration_seconds", "method" => self.method_label(method))
            .record(elapsed.as_secs_f64());
    }
}

/// Install the global recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
