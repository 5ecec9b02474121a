//! Admission metrics.
//!
//! # Metrics
//! - `resilience_permits_acquired_total` (counter): permits granted by pool, lane
//! - `resilience_permits_released_total` (counter): permits returned by pool
//! - `resilience_admission_rejected_total` (counter): rejections by pool, reason
//! - `resilience_profile_pools` (gauge): pools in the active profile
//! - `resilience_profile_pipelines` (gauge): pipelines in the active profile
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   these calls are no-ops
//! - Exporter wiring belongs to the host process

use metrics::{counter, gauge};

pub fn record_permit_acquired(pool: &str, lane: &str) {
    counter!(
        "resilience_permits_acquired_total",
        "pool" => pool.to_string(),
        "lane" => lane.to_string()
    )
    .increment(1);
}

pub fn record_permits_released(pool: &str, count: usize) {
    counter!("resilience_permits_released_total", "pool" => pool.to_string())
        .increment(count as u64);
}

pub fn record_admission_rejected(pool: &str, reason: &'static str) {
    counter!(
        "resilience_admission_rejected_total",
        "pool" => pool.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_profile_built(pools: usize, pipelines: usize) {
    gauge!("resilience_profile_pools").set(pools as f64);
    gauge!("resilience_profile_pipelines").set(pipelines as f64);
}
