//! Application metrics for Prometheus monitoring.
//!
//! Recorder initialization, metric definitions, and the helpers the
//! protocol handlers call. Rendering happens on the dedicated metrics
//! listener (`routes::metrics`).

use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Called once at startup, before any metrics are recorded. Returns `true`
/// if this call installed the recorder, `false` if one was already in
/// place (repeated init in tests).
pub fn init_metrics() -> bool {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    // Installing the recorder is the single point of contention; losing
    // the race means another init already ran and its handle is the live
    // one.
    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("metrics recorder already installed, skipping init");
        return false;
    }
    let _ = PROMETHEUS_HANDLE.set(handle);

    describe_metrics();
    true
}

fn describe_metrics() {
    describe_counter!("rpiped_jobs_created_total", "Jobs created via /new");
    describe_counter!(
        "rpiped_jobs_completed_total",
        "Jobs reaped and forgotten via /done"
    );
    describe_counter!(
        "rpiped_chunks_uploaded_total",
        "Chunks accepted and forwarded to subprocess stdin"
    );
    describe_counter!(
        "rpiped_bytes_piped_total",
        "Payload bytes written into subprocess stdin"
    );
    describe_counter!(
        "rpiped_upload_errors_total",
        "Upload requests rejected or failed"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_job_created() {
    counter!("rpiped_jobs_created_total").increment(1);
}

pub fn record_job_completed() {
    counter!("rpiped_jobs_completed_total").increment(1);
}

pub fn record_chunk(bytes: u64) {
    counter!("rpiped_chunks_uploaded_total").increment(1);
    counter!("rpiped_bytes_piped_total").increment(bytes);
}

pub fn record_upload_error() {
    counter!("rpiped_upload_errors_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_helpers_do_not_panic_uninitialized() {
        // With no recorder installed these are no-ops.
        record_job_created();
        record_job_completed();
        record_chunk(1024);
        record_upload_error();
    }
}
