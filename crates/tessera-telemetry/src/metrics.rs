//! Request metrics.
//!
//! Metrics go through the `metrics` facade; without an installed recorder
//! every call is a no-op.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `tessera_requests_total` | Counter | `controller`, `action`, `status` |
//! | `tessera_request_duration_seconds` | Histogram | `controller`, `action` |
//! | `tessera_exceptions_total` | Counter | `category` |
//! | `tessera_in_flight_requests` | Gauge | - |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const REQUESTS_TOTAL: &str = "tessera_requests_total";
const REQUEST_DURATION: &str = "tessera_request_duration_seconds";
const EXCEPTIONS_TOTAL: &str = "tessera_exceptions_total";
const IN_FLIGHT: &str = "tessera_in_flight_requests";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder.
    pub enabled: bool,

    /// Serve `/metrics` on this address. Needs a running Tokio runtime.
    /// Without it the recorder is installed and [`render_metrics`] renders on demand.
    pub addr: Option<String>,

    /// Buckets for the duration histogram, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: None,
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// # Errors
///
/// Returns [`TelemetryError`] for a malformed address or when a recorder
/// is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let builder = PrometheusBuilder::new()
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    match &config.addr {
        Some(addr) => {
            let addr: SocketAddr = addr
                .parse()
                .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;
            builder
                .with_http_listener(addr)
                .install()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        }
        None => {
            let handle = builder
                .install_recorder()
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            let _ = METRICS_HANDLE.set(handle);
        }
    }

    describe_metrics();
    Ok(())
}

/// Renders metrics in Prometheus text format, if the recorder was
/// installed without a listener.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Requests dispatched");
    describe_histogram!(REQUEST_DURATION, "Dispatch duration in seconds");
    describe_counter!(EXCEPTIONS_TOTAL, "Errors converted into responses, by category");
    describe_gauge!(IN_FLIGHT, "Requests currently being dispatched");
}

/// Records a finished request.
pub fn record_request(controller: &str, action: &str, status: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "controller" => controller.to_string(),
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        REQUEST_DURATION,
        "controller" => controller.to_string(),
        "action" => action.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records an error rendered by the exception handler.
pub fn record_exception(category: &str) {
    counter!(EXCEPTIONS_TOTAL, "category" => category.to_string()).increment(1);
}

/// Keeps the in-flight gauge raised while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert!(config.addr.is_none());
        assert_eq!(config.duration_buckets.len(), 12);
    }

    #[test]
    fn test_disabled_is_noop() {
        let config = MetricsConfig {
            addr: Some("nowhere".to_string()),
            ..Default::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_addr() {
        let config = MetricsConfig {
            enabled: true,
            addr: Some("nowhere".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_recording_without_recorder() {
        let guard = InFlightGuard::new();
        record_request("User", "show", 200, Duration::from_millis(3));
        record_exception("not_found");
        drop(guard);
    }
}
