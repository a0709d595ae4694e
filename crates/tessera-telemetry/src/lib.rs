//! Logging and metrics for Tessera applications.
//!
//! - **Logging**: `tracing` events rendered as JSON lines or pretty text.
//! - **Metrics**: per-request counters and histograms through the `metrics`
//!   facade, exported in Prometheus format when enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let metrics = MetricsConfig {
//!         enabled: true,
//!         addr: Some("0.0.0.0:9090".to_string()),
//!         ..Default::default()
//!     };
//!     init_telemetry(&LogConfig::production(), &metrics).expect("telemetry");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/tessera-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_exception, record_request, render_metrics, InFlightGuard, MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging, then metrics.
///
/// # Errors
///
/// Returns the first subsystem error.
pub fn init_telemetry(log: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(log)?;
    init_metrics(metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_disabled_subsystems() {
        let log = LogConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(init_telemetry(&log, &MetricsConfig::default()).is_ok());
    }
}
