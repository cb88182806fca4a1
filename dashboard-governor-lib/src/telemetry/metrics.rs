use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

use crate::governor::Endpoint;

pub mod labels {
    pub const ERROR_TYPE: &str = "error_type";
    pub const ENDPOINT: &str = "endpoint";
    pub const DECISION: &str = "decision";
    pub const REASON: &str = "reason";
    pub const OUTCOME: &str = "outcome";
    pub const POOL: &str = "pool";
    pub const COMPONENT: &str = "component";
    pub const TRIGGER: &str = "trigger";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const DECISION_ADMITTED: &str = "admitted";
    pub const DECISION_REJECTED: &str = "rejected";
    pub const REJECT_RATE_LIMITED: &str = "rate_limited";
    pub const REJECT_OVERLOADED: &str = "overloaded";
    pub const OUTCOME_SUCCESS: &str = "success";
    pub const OUTCOME_FAILURE: &str = "failure";
    pub const COMPONENT_MEMORY_PROBE: &str = "memory_probe";
    pub const COMPONENT_MONITOR: &str = "monitor";
    pub const COMPONENT_POOL_TRIM: &str = "pool_trim";
    pub const TRIGGER_PRESSURE: &str = "memory_pressure";
    pub const TRIGGER_MANUAL: &str = "manual";
    pub const ERROR_CONNECTION: &str = "connection";
}

#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,

    // Governed dashboard requests
    pub governed_requests_total: Counter<u64>,
    pub rejections_total: Counter<u64>,
    pub governed_duration_seconds: Histogram<f64>,

    pub memory_usage_percent: Gauge<f64>,

    // Background optimizer
    pub pool_reclaim_passes_total: Counter<u64>,
    pub memory_reclaim_passes_total: Counter<u64>,
    pub memory_reclaimed_entries_total: Counter<u64>,
    pub background_failures_total: Counter<u64>,

    pub errors_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("dashboard_governor_connections_total")
                .with_description("Total number of client connections accepted")
                .build(),
            connections_active: meter
                .i64_up_down_counter("dashboard_governor_connections_active")
                .with_description("Number of active client connections")
                .build(),

            governed_requests_total: meter
                .u64_counter("dashboard_governor_requests_total")
                .with_description("Total number of governed dashboard requests by endpoint and decision")
                .build(),
            rejections_total: meter
                .u64_counter("dashboard_governor_rejections_total")
                .with_description("Total number of rejected dashboard requests. reason=rate_limited|overloaded")
                .build(),
            governed_duration_seconds: meter
                .f64_histogram("dashboard_governor_request_duration_seconds")
                .with_description("Governed request duration in seconds")
                .build(),

            memory_usage_percent: meter
                .f64_gauge("dashboard_governor_memory_usage_percent")
                .with_description("Latest sampled system memory utilization")
                .build(),

            pool_reclaim_passes_total: meter
                .u64_counter("dashboard_governor_pool_reclaim_passes_total")
                .with_description("Total number of idle-connection reclaim passes per pool")
                .build(),
            memory_reclaim_passes_total: meter
                .u64_counter("dashboard_governor_memory_reclaim_passes_total")
                .with_description("Total number of forced memory reclamation passes")
                .build(),
            memory_reclaimed_entries_total: meter
                .u64_counter("dashboard_governor_memory_reclaimed_entries_total")
                .with_description("Rate-limit windows and metric buckets released by reclamation")
                .build(),
            background_failures_total: meter
                .u64_counter("dashboard_governor_background_failures_total")
                .with_description("Total number of failed background or probe operations")
                .build(),

            errors_total: meter
                .u64_counter("dashboard_governor_errors_total")
                .with_description("Total number of errors")
                .build(),

            build_info: meter
                .u64_gauge("dashboard_governor_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_admitted(&self, endpoint: Endpoint) {
        self.governed_requests_total.add(
            1,
            &[
                KeyValue::new(labels::ENDPOINT, endpoint.as_str()),
                KeyValue::new(labels::DECISION, values::DECISION_ADMITTED),
            ],
        );
    }

    pub fn record_rejection(&self, reason: &'static str, endpoint: Endpoint) {
        self.governed_requests_total.add(
            1,
            &[
                KeyValue::new(labels::ENDPOINT, endpoint.as_str()),
                KeyValue::new(labels::DECISION, values::DECISION_REJECTED),
            ],
        );
        self.rejections_total.add(
            1,
            &[
                KeyValue::new(labels::REASON, reason),
                KeyValue::new(labels::ENDPOINT, endpoint.as_str()),
            ],
        );
    }

    pub fn record_completion(&self, endpoint: Endpoint, duration: f64, success: bool) {
        let outcome = if success { values::OUTCOME_SUCCESS } else { values::OUTCOME_FAILURE };
        self.governed_duration_seconds.record(
            duration,
            &[
                KeyValue::new(labels::ENDPOINT, endpoint.as_str()),
                KeyValue::new(labels::OUTCOME, outcome),
            ],
        );
    }

    pub fn record_memory_usage(&self, percent: f64) {
        self.memory_usage_percent.record(percent, &[]);
    }

    pub fn record_pool_reclaim(&self, pool: &str) {
        self.pool_reclaim_passes_total
            .add(1, &[KeyValue::new(labels::POOL, pool.to_string())]);
    }

    pub fn record_memory_reclaim(&self, trigger: &'static str, released: u64) {
        self.memory_reclaim_passes_total
            .add(1, &[KeyValue::new(labels::TRIGGER, trigger)]);
        if released > 0 {
            self.memory_reclaimed_entries_total.add(released, &[]);
        }
    }

    pub fn record_background_failure(&self, component: &'static str) {
        self.background_failures_total
            .add(1, &[KeyValue::new(labels::COMPONENT, component)]);
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, error_type.to_string())]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("dashboard-governor");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
