//! Telemetry setup for kallax.
//!
//! Supports:
//! - Tracing with configurable log levels and a debug toggle
//! - Prometheus metrics endpoint (with `prometheus` feature)

#[cfg(feature = "prometheus")]
use std::net::SocketAddr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;
use crate::error::DnsError;

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), DnsError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.effective_log_level()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| DnsError::Config(format!("failed to initialize tracing: {e}")))
}

/// Start the Prometheus metrics HTTP exporter, if one is configured.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(config: &TelemetryConfig) -> Result<(), DnsError> {
    #[cfg(feature = "prometheus")]
    if let Some(addr) = config.prometheus_addr {
        start_prometheus_exporter(addr)?;
    }

    #[cfg(not(feature = "prometheus"))]
    if config.prometheus_addr.is_some() {
        tracing::warn!("built without the prometheus feature, metrics endpoint disabled");
    }

    Ok(())
}

/// Start Prometheus metrics HTTP exporter.
#[cfg(feature = "prometheus")]
fn start_prometheus_exporter(addr: SocketAddr) -> Result<(), DnsError> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    use crate::metrics::PROCESSING_TIME_BUCKETS;

    // matches both the dotted key and its sanitized form
    let matcher = Matcher::Suffix("query_processing_time".to_string());
    PrometheusBuilder::new()
        .set_buckets_for_metric(matcher, PROCESSING_TIME_BUCKETS)
        .and_then(|builder| builder.with_http_listener(addr).install())
        .map_err(|e| DnsError::Metrics(e.to_string()))?;

    tracing::info!(%addr, "Prometheus metrics exporter started");

    Ok(())
}
