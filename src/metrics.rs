use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "log_records_dropped_total",
        "Log records dropped because a stream buffer was full"
    );
    describe_counter!(
        "log_records_flushed_total",
        "Log records written to a stream sink"
    );
    describe_counter!(
        "log_sink_write_errors_total",
        "Failed batch writes to a stream sink"
    );
    describe_counter!(
        "http_requests_total",
        "Completed HTTP requests"
    );
    describe_gauge!(
        "readbook_info",
        "Service version information"
    );

    gauge!("readbook_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_log_dropped(stream: &'static str) {
    counter!("log_records_dropped_total", "stream" => stream).increment(1);
}

pub fn record_log_flushed(stream: &'static str, count: u64) {
    counter!("log_records_flushed_total", "stream" => stream).increment(count);
}

pub fn record_log_write_error(stream: &'static str) {
    counter!("log_sink_write_errors_total", "stream" => stream).increment(1);
}

pub fn record_request(method: &str, status: u16) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}
