//! Permission propagation counters.
//!
//! Recorded through the `metrics` facade; they are no-ops until a recorder is installed.

use metrics::{counter, histogram};

/// A structural event produced a non-empty plan.
pub fn track_sync_plan(event: &'static str, mutations: usize) {
    counter!("permission_sync_plans_total", "event" => event).increment(1);
    histogram!("permission_sync_plan_mutations", "event" => event).record(mutations as f64);
}

/// Propagation failed for `event`; `policy` decides whether the structural change survived.
pub fn track_sync_failure(event: &'static str, policy: &'static str) {
    counter!("permission_sync_failures_total", "event" => event, "policy" => policy).increment(1);
}

pub fn track_documents_written(count: usize) {
    counter!("permission_documents_written_total").increment(count as u64);
}

pub fn track_drift_detected(count: usize) {
    counter!("permission_drift_detected_total").increment(count as u64);
}
