//! Router metrics.
//!
//! # Metrics
//! - `router_navigations_total` (counter): settled navigations by outcome
//! - `router_navigation_duration_seconds` (histogram): time from push to settle
//! - `router_guard_invocations_total` (counter): guards run, by phase
//! - `router_registered_routes` (gauge): ranked records in the registry
//!
//! # Design Decisions
//! - Updates are facade calls; they are no-ops until a recorder is installed
//! - Outcome labels are the failure kinds plus `confirmed` and `error`

use std::time::Instant;

/// Record a settled navigation.
pub fn record_navigation(outcome: &'static str, start: Instant) {
    ::metrics::counter!("router_navigations_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("router_navigation_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one guard invocation.
pub fn record_guard(phase: &'static str) {
    ::metrics::counter!("router_guard_invocations_total", "phase" => phase).increment(1);
}

/// Record the number of ranked records.
pub fn record_registered_routes(count: usize) {
    ::metrics::gauge!("router_registered_routes").set(count as f64);
}
