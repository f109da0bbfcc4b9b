//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, matcher and config watcher produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → spans.rs (one span per navigation, tagged with its ID)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event, never formatted-only messages
//! - Navigation ID flows through every event of a navigation
//! - Metrics go through the `metrics` facade; installing a recorder is left
//!   to the embedding application

pub mod logging;
pub mod metrics;
pub mod spans;
