use hl_core::metrics::{describe, API_REQUEST_LATENCY_SECONDS, LATENCY_BUCKETS};
use hl_core::{Error, Result};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tracing::info;

/// Install the global Prometheus recorder with its scrape endpoint on `addr`.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    let exporter_error = |e: BuildError| Error::Config(format!("Failed to start metrics exporter: {}", e));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(API_REQUEST_LATENCY_SECONDS.to_string()), LATENCY_BUCKETS)
        .map_err(exporter_error)?
        .install()
        .map_err(exporter_error)?;
    describe();

    info!("📈 Metrics exported on http://{}/metrics", addr);
    Ok(())
}
