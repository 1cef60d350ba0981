//! Prometheus metrics.
//!
//! Registered lazily in the default registry; the bot exposes them via
//! the periodic summary log rather than a scrape endpoint.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, CounterVec, GaugeVec, Histogram,
};

/// Orchestrator cycles completed.
pub static CYCLE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "martin_cycles_total",
        "Orchestrator cycles completed, by result",
        &["result"]
    )
    .expect("metric registration")
});

/// Cycle duration in seconds.
pub static CYCLE_DURATION_SECS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "martin_cycle_duration_seconds",
        "Wall-clock duration of one orchestrator cycle",
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("metric registration")
});

/// Status transitions applied, by target status.
pub static TRANSITION_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "martin_transitions_total",
        "Trade status transitions applied",
        &["to"]
    )
    .expect("metric registration")
});

/// Signals accepted, by asset and direction.
pub static SIGNAL_ACCEPTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "martin_signals_accepted_total",
        "Qualifying TA signals accepted",
        &["asset", "direction"]
    )
    .expect("metric registration")
});

/// External fetch failures, by source.
pub static FETCH_FAILURE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "martin_fetch_failures_total",
        "External fetches that exhausted retries",
        &["source"]
    )
    .expect("metric registration")
});

/// Snapshot age per asset in seconds.
pub static SNAPSHOT_AGE_SECS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "martin_snapshot_age_seconds",
        "Age of the newest TA snapshot per asset",
        &["asset"]
    )
    .expect("metric registration")
});

/// Static helpers so call sites stay one-liners.
pub struct Metrics;

impl Metrics {
    pub fn cycle_completed(ok: bool) {
        let result = if ok { "ok" } else { "error" };
        CYCLE_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn cycle_duration(secs: f64) {
        CYCLE_DURATION_SECS.observe(secs);
    }

    pub fn transition(to: &str) {
        TRANSITION_TOTAL.with_label_values(&[to]).inc();
    }

    pub fn signal_accepted(asset: &str, direction: &str) {
        SIGNAL_ACCEPTED_TOTAL
            .with_label_values(&[asset, direction])
            .inc();
    }

    pub fn fetch_failure(source: &str) {
        FETCH_FAILURE_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn snapshot_age(asset: &str, secs: f64) {
        SNAPSHOT_AGE_SECS.with_label_values(&[asset]).set(secs);
    }
}
