//! Prometheus Metrics Module
//!
//! Exposes synchronization metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Stream**: Frames received per message type, dropped frames, handler failures
//! - **Connection**: Connected gauge, reconnect attempts, exhausted backoff
//! - **REST**: Requests per operation and outcome, request latency
//!
//! # Integration
//!
//! When a metrics port is configured the exporter serves `/metrics` on it.
//! Without a recorder installed every recording call is a no-op.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Exporter
// =============================================================================

static EXPORTER_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from within a Tokio runtime. Calling it again after a
/// successful install does nothing.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = EXPORTER_ADDR.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    register_metrics();
    tracing::info!(addr = %addr, "Metrics exporter listening");

    Ok(*EXPORTER_ADDR.get_or_init(|| addr))
}

/// Address the exporter listens on, if installed.
#[must_use]
pub fn exporter_addr() -> Option<SocketAddr> {
    EXPORTER_ADDR.get().copied()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "fleet_sync_stream_frames_received_total",
        "Stream frames decoded, by message type"
    );
    describe_counter!(
        "fleet_sync_stream_frames_dropped_total",
        "Stream frames dropped as malformed, by reason"
    );
    describe_counter!(
        "fleet_sync_handler_failures_total",
        "Subscriber handler failures, by message type"
    );

    describe_gauge!(
        "fleet_sync_stream_connected",
        "1 while the stream socket is open"
    );
    describe_counter!(
        "fleet_sync_stream_errors_total",
        "Stream sessions ended, by cause"
    );
    describe_counter!(
        "fleet_sync_stream_reconnects_total",
        "Stream reconnection attempts scheduled"
    );
    describe_counter!(
        "fleet_sync_stream_reconnects_exhausted_total",
        "Times the reconnect budget ran out"
    );

    describe_counter!(
        "fleet_sync_rest_requests_total",
        "Fleet API requests, by operation and outcome"
    );
    describe_histogram!(
        "fleet_sync_rest_request_duration_seconds",
        "Fleet API request latency"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a decoded stream frame.
pub fn record_frame_received(message_type: &str) {
    counter!(
        "fleet_sync_stream_frames_received_total",
        "message_type" => message_type.to_string()
    )
    .increment(1);
}

/// Record a dropped stream frame.
pub fn record_frame_dropped(reason: &'static str) {
    counter!("fleet_sync_stream_frames_dropped_total", "reason" => reason).increment(1);
}

/// Record handler failures from one dispatch.
pub fn record_handler_failures(message_type: &str, count: usize) {
    counter!(
        "fleet_sync_handler_failures_total",
        "message_type" => message_type.to_string()
    )
    .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Update the connected gauge.
pub fn set_stream_connected(connected: bool) {
    gauge!("fleet_sync_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record the end of a stream session.
pub fn record_stream_error(kind: &'static str) {
    counter!("fleet_sync_stream_errors_total", "kind" => kind).increment(1);
}

/// Record a scheduled reconnection attempt.
pub fn record_reconnect() {
    counter!("fleet_sync_stream_reconnects_total").increment(1);
}

/// Record that the reconnect budget ran out.
pub fn record_reconnects_exhausted() {
    counter!("fleet_sync_stream_reconnects_exhausted_total").increment(1);
}

/// Record a fleet API request.
pub fn record_rest_request(operation: &'static str, outcome: &'static str, duration: Duration) {
    counter!(
        "fleet_sync_rest_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "fleet_sync_rest_request_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
