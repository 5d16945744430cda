//! Prometheus metrics & middleware helper.

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use once_cell::sync::Lazy;
use prometheus::{IntCounter, Registry};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Global Prometheus handle reused in tests.
pub static METRICS: Lazy<PrometheusMetrics> = Lazy::new(|| {
    PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics") // exposed URL
        .registry(REGISTRY.clone())
        .build()
        .expect("metrics builder")
});

fn counter(name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
}

pub static BATTLES_STARTED: Lazy<IntCounter> =
    Lazy::new(|| counter("battles_started_total", "Battles that entered in_progress"));

pub static BATTLES_COMPLETED: Lazy<IntCounter> =
    Lazy::new(|| counter("battles_completed_total", "Battles that reached completed"));

pub static TURNS_APPLIED: Lazy<IntCounter> =
    Lazy::new(|| counter("turns_applied_total", "Timeline turn events committed"));

pub static FORCED_TIMEOUTS: Lazy<IntCounter> =
    Lazy::new(|| counter("forced_timeouts_total", "Turn deadlines enforced by the sweep"));
