//! Metrics collection and exposition.
//!
//! # Metrics
//! - `enforcer_decisions_total` (counter): decisions by api, outcome, status
//! - `enforcer_filter_rejections_total` (counter): chain stops by filter, error code
//! - `enforcer_decision_duration_seconds` (histogram): time spent per decision
//! - `enforcer_published_apis` (gauge): APIs in the current snapshot
//! - `enforcer_analytics_dropped_total` (counter): events lost to a closed channel
//!
//! # Design Decisions
//! - Free functions over the `metrics` facade; call sites stay one line
//! - Labels are bounded: API display name, outcome, status, filter, error code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe_metrics();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "enforcer_decisions_total",
        Unit::Count,
        "Enforcement decisions by API, outcome and status"
    );
    describe_counter!(
        "enforcer_filter_rejections_total",
        Unit::Count,
        "Filter chain stops by filter and error code"
    );
    describe_histogram!(
        "enforcer_decision_duration_seconds",
        Unit::Seconds,
        "Time spent producing one decision"
    );
    describe_gauge!(
        "enforcer_published_apis",
        Unit::Count,
        "APIs currently routable"
    );
    describe_counter!(
        "enforcer_analytics_dropped_total",
        Unit::Count,
        "Analytics events dropped because the consumer is gone"
    );
}

/// Record a finished decision.
pub fn record_decision(api: &str, outcome: &'static str, status: u16, start: Instant) {
    let labels = [
        ("api", api.to_string()),
        ("outcome", outcome.to_string()),
        ("status", status.to_string()),
    ];
    counter!("enforcer_decisions_total", &labels).increment(1);
    histogram!("enforcer_decision_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_filter_rejection(filter: &'static str, code: &str) {
    counter!(
        "enforcer_filter_rejections_total",
        "filter" => filter,
        "code" => code.to_string()
    )
    .increment(1);
}

pub fn record_published_apis(count: usize) {
    gauge!("enforcer_published_apis").set(count as f64);
}

pub fn record_analytics_dropped() {
    counter!("enforcer_analytics_dropped_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_decision("petstore:1.0.0", "allow", 200, Instant::now());
        record_filter_rejection("auth", "900902");
        record_published_apis(3);
        record_analytics_dropped();
    }
}
