use std::time::Duration;

use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

struct ResearchMetrics {
    runs: Counter<u64>,
    duration_ms: Histogram<f64>,
    cache_hits: Counter<u64>,
    rate_limit_waits: Counter<u64>,
    rate_limit_wait_ms: Histogram<f64>,
}

static METRICS: OnceCell<ResearchMetrics> = OnceCell::new();

fn handles() -> &'static ResearchMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("stratai.research");
        ResearchMetrics {
            runs: meter
                .u64_counter("research_runs_total")
                .with_description("Research runs by final status")
                .init(),
            duration_ms: meter
                .f64_histogram("research_duration_ms")
                .with_description("Wall-clock duration of a full crew run")
                .init(),
            cache_hits: meter
                .u64_counter("research_cache_hits_total")
                .with_description("Runs answered from the (company, industry) cache")
                .init(),
            rate_limit_waits: meter
                .u64_counter("rate_limit_waits_total")
                .with_description("Requests delayed by the requests-per-minute ceiling")
                .init(),
            rate_limit_wait_ms: meter
                .f64_histogram("rate_limit_wait_ms")
                .with_description("Time spent waiting for a rate-limit permit")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) {
    if std::env::var("STRATAI_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "STRATAI_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export research metrics."
        );
    }
}

/// Record the outcome of a crew run (no-op if no provider installed).
pub fn record_research_run(status: &str, duration: Duration) {
    let metrics = handles();
    let attrs = [KeyValue::new("status", status.to_string())];
    metrics.runs.add(1, &attrs);
    metrics
        .duration_ms
        .record(duration.as_secs_f64() * 1000.0, &attrs);
}

pub fn record_cache_hit() {
    handles().cache_hits.add(1, &[]);
}

pub fn record_rate_limit_wait(wait: Duration) {
    let metrics = handles();
    metrics.rate_limit_waits.add(1, &[]);
    metrics
        .rate_limit_wait_ms
        .record(wait.as_secs_f64() * 1000.0, &[]);
}
