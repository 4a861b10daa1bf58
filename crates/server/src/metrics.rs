//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions for uploads, import jobs and pages
//! - Helper functions for recording metrics

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

use larder_types::JobStatus;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "import_uploads_total",
        "Uploads received, by result (job, inline, rejected)"
    );
    describe_counter!(
        "import_jobs_total",
        "Import jobs that reached a terminal status, by status"
    );
    describe_counter!(
        "import_pages_total",
        "Pages attempted, by outcome (recipe, no_recipe, error)"
    );
    describe_histogram!(
        "import_job_duration_seconds",
        "Wall time from processor start to terminal status"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record one upload by what the endpoint did with it.
pub fn record_upload(result: &'static str) {
    counter!("import_uploads_total", "result" => result).increment(1);
}

/// Record one attempted page.
pub fn record_page(outcome: &'static str) {
    counter!("import_pages_total", "outcome" => outcome).increment(1);
}

/// Record a job reaching a terminal status.
pub fn record_job_finished(status: JobStatus, duration: Duration) {
    counter!("import_jobs_total", "status" => status.as_str()).increment(1);
    histogram!("import_job_duration_seconds", "status" => status.as_str())
        .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // No global recorder may be installed yet; the macros must not panic.
        record_upload("rejected");
        record_page("recipe");
        record_job_finished(JobStatus::Completed, Duration::from_millis(5));
    }

    #[test]
    fn test_rendered_output_after_init() {
        init_metrics();
        record_job_finished(JobStatus::Cancelled, Duration::from_millis(1));
        let rendered = render_metrics().expect("initialized");
        assert!(rendered.contains("import_jobs_total"));
    }
}
