use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the charge gateway. Emits through the
/// `metrics` facade; whatever recorder the host process installs
/// receives the samples.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_charge_created(&self) {
        counter!("gateway_charges_created_total").increment(1);
    }

    pub fn record_charge_settled(&self, method: &str) {
        counter!("gateway_charges_settled_total", "method" => method.to_string()).increment(1);
    }

    /// `method` is the settlement method reversed, or `None` when the
    /// charge was still pending.
    pub fn record_charge_cancelled(&self, method: Option<&str>) {
        let label = method.unwrap_or("none");
        counter!("gateway_charges_cancelled_total", "settled_method" => label.to_string())
            .increment(1);
    }

    pub fn record_deposit(&self) {
        counter!("gateway_deposits_total").increment(1);
    }

    pub fn record_authorizer_decision(&self, approved: bool) {
        counter!("gateway_authorizer_decisions_total", "approved" => approved.to_string())
            .increment(1);
    }

    pub fn record_commit_conflict(&self, operation: &str) {
        counter!("gateway_commit_conflicts_total", "operation" => operation.to_string())
            .increment(1);
    }

    pub fn record_settlement_latency(&self, duration_ms: f64) {
        histogram!("gateway_settlement_duration_ms").record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Initializes the metrics registry and describes the exported series.
pub fn init_metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        describe_metrics();
        Metrics::new()
    })
}

/// Returns the global metrics instance, initializing it on first use.
pub fn get_metrics() -> &'static Metrics {
    init_metrics()
}

fn describe_metrics() {
    describe_counter!(
        "gateway_charges_created_total",
        Unit::Count,
        "Total number of charges created"
    );
    describe_counter!(
        "gateway_charges_settled_total",
        Unit::Count,
        "Total number of charges settled, by method"
    );
    describe_counter!(
        "gateway_charges_cancelled_total",
        Unit::Count,
        "Total number of charges cancelled, by reversed method"
    );
    describe_counter!(
        "gateway_deposits_total",
        Unit::Count,
        "Total number of deposits credited"
    );
    describe_counter!(
        "gateway_authorizer_decisions_total",
        Unit::Count,
        "Authorizer verdicts, by outcome"
    );
    describe_counter!(
        "gateway_commit_conflicts_total",
        Unit::Count,
        "Optimistic commit conflicts, by operation"
    );
    describe_histogram!(
        "gateway_settlement_duration_ms",
        Unit::Milliseconds,
        "End-to-end settlement latency in milliseconds"
    );
}
