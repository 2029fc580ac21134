//! Prometheus metrics for proxied requests.
//!
//! The recorder is process-global; [`init`] installs it once and hands out
//! the shared render handle on every later call.

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
///
/// Returns `None` if another recorder was installed first; metrics calls
/// then go to that recorder instead.
pub fn init() -> Option<PrometheusHandle> {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Prometheus recorder not installed: {}", e);
                None
            }
        })
        .clone()
}

/// Count one proxied request by resource kind and response status.
pub fn record_request(kind: &'static str, status: u16) {
    counter!("hlsgate_requests_total", "kind" => kind, "status" => status.to_string())
        .increment(1);
}

/// Time from request arrival to response headers.
pub fn record_duration(kind: &'static str, start: Instant) {
    histogram!("hlsgate_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("hlsgate_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_redirect() {
    counter!("hlsgate_redirects_total").increment(1);
}
