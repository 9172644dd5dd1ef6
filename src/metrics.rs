//! Prometheus metrics (ambient, not named by the core spec but carried from
//! the teacher's observability stack): request counts, token counts, and
//! latency histograms labeled by provider/model/endpoint.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();
    handle
}

fn describe_metrics() {
    describe_counter!("nexus_requests_total", "Total number of gateway requests");
    describe_counter!("nexus_tokens_total", "Total number of tokens processed");
    describe_histogram!("nexus_request_duration_seconds", "Request duration in seconds");
    describe_counter!("nexus_errors_total", "Total number of errors");
    describe_gauge!("nexus_gateway_info", "Gateway version information");
    describe_gauge!("nexus_active_accounts", "Number of active upstream accounts");

    gauge!("nexus_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

pub fn record_request(provider: &str, model: &str, endpoint: &str) {
    counter!(
        "nexus_requests_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "endpoint" => endpoint.to_string(),
    )
    .increment(1);
}

pub fn record_tokens(provider: &str, model: &str, token_type: &str, count: u64) {
    counter!(
        "nexus_tokens_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "type" => token_type.to_string(),
    )
    .increment(count);
}

pub fn record_duration(provider: &str, model: &str, duration: Duration) {
    histogram!(
        "nexus_request_duration_seconds",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
    )
    .record(duration.as_secs_f64());
}

pub fn record_error(provider: &str, model: &str, error_type: &str) {
    counter!(
        "nexus_errors_total",
        "provider" => provider.to_string(),
        "model" => model.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

pub fn update_active_accounts(count: usize) {
    gauge!("nexus_active_accounts").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_functions_do_not_panic() {
        describe_metrics();
        record_request("google", "gemini-3-flash", "/v1/chat/completions");
        record_tokens("google", "gemini-3-flash", "input", 100);
        record_duration("google", "gemini-3-flash", Duration::from_millis(250));
        record_error("google", "gemini-3-flash", "upstream_status");
        update_active_accounts(2);
    }
}
