//! Prometheus metrics exposition
//!
//! Series recorded across the workspace:
//!
//! - `poller_cycles_total` (counter): label `outcome` (success, auth, api, parse)
//! - `poller_fetch_duration_seconds` (histogram)
//! - `poller_records_last` (gauge)
//! - `auth_token_refresh_total` (counter): label `outcome`
//! - `chart_requests_total` (counter): label `route`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const FETCH_DURATION: &str = "poller_fetch_duration_seconds";

/// Bucket boundaries from 50ms up to the largest sensible request timeout.
const FETCH_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(FETCH_DURATION.to_string()), FETCH_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// `poller_fetch_duration_seconds` gets explicit buckets so it renders as a
/// histogram rather than a summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a request served by the chart listener.
pub fn record_page_view(route: &'static str) {
    metrics::counter!("chart_requests_total", "route" => route).increment(1);
}
